//! Rate-limited outbound dispatch of generated artifacts.
//!
//! The dispatcher keeps two sliding windows (per-minute and per-hour) of
//! accepted-send timestamps. A send is admitted only when both windows are
//! under their caps, and is recorded before the sink I/O is attempted so a
//! burst cannot slip through between check and record. Rejected sends are
//! the caller's problem; the dispatcher never blocks or retries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::WorkItem;
use crate::error::Result;
use crate::id::generate_artifact_id;

/// A response artifact produced by an auto-responding agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundArtifact {
    pub id: String,
    /// Item this artifact responds to
    pub in_reply_to: String,
    /// Agent that produced it
    pub agent_id: String,
    /// Opaque body (content generation is out of scope for this core)
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl OutboundArtifact {
    /// Synthesize the response artifact for a completed item.
    pub fn response_to(item: &WorkItem, agent_id: &str) -> Self {
        Self {
            id: generate_artifact_id(&item.id),
            in_reply_to: item.id.clone(),
            agent_id: agent_id.to_string(),
            body: format!("auto-response from {} for {}", agent_id, item.id),
            created_at: Utc::now(),
        }
    }
}

/// Destination for accepted artifacts.
pub trait DispatchSink: Send + Sync {
    fn deliver(&self, artifact: &OutboundArtifact) -> Result<()>;
}

/// Production sink: logs the artifact. Actual delivery transports live
/// outside this core.
#[derive(Debug, Default)]
pub struct LogSink;

impl DispatchSink for LogSink {
    fn deliver(&self, artifact: &OutboundArtifact) -> Result<()> {
        tracing::info!(
            artifact_id = %artifact.id,
            agent = %artifact.agent_id,
            in_reply_to = %artifact.in_reply_to,
            "artifact dispatched"
        );
        Ok(())
    }
}

/// Test sink collecting everything delivered to it.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<OutboundArtifact>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutboundArtifact> {
        self.sent.lock().expect("sink lock poisoned").clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sink lock poisoned").len()
    }
}

impl DispatchSink for MemorySink {
    fn deliver(&self, artifact: &OutboundArtifact) -> Result<()> {
        self.sent.lock().expect("sink lock poisoned").push(artifact.clone());
        Ok(())
    }
}

struct Windows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

/// Bounded-rate outbound sender.
pub struct RateLimitedDispatcher {
    per_minute_cap: usize,
    per_hour_cap: usize,
    windows: Mutex<Windows>,
    sink: Arc<dyn DispatchSink>,
}

impl RateLimitedDispatcher {
    pub fn new(per_minute_cap: usize, per_hour_cap: usize, sink: Arc<dyn DispatchSink>) -> Self {
        Self {
            per_minute_cap,
            per_hour_cap,
            windows: Mutex::new(Windows {
                minute: VecDeque::new(),
                hour: VecDeque::new(),
            }),
            sink,
        }
    }

    /// Admission check and record against both windows at the given
    /// instant. Recording happens under the same lock as the check.
    fn admit_at(&self, now: Instant) -> bool {
        let mut windows = self.windows.lock().expect("dispatcher lock poisoned");

        if let Some(cutoff) = now.checked_sub(Duration::from_secs(60)) {
            while windows.minute.front().is_some_and(|t| *t <= cutoff) {
                windows.minute.pop_front();
            }
        }
        if let Some(cutoff) = now.checked_sub(Duration::from_secs(3600)) {
            while windows.hour.front().is_some_and(|t| *t <= cutoff) {
                windows.hour.pop_front();
            }
        }

        if windows.minute.len() >= self.per_minute_cap || windows.hour.len() >= self.per_hour_cap {
            return false;
        }

        windows.minute.push_back(now);
        windows.hour.push_back(now);
        true
    }

    /// Try to send an artifact. Returns `false` when either window is at
    /// its cap; the caller decides whether to retry or drop.
    pub fn try_send(&self, artifact: &OutboundArtifact) -> bool {
        if !self.admit_at(Instant::now()) {
            tracing::warn!(
                artifact_id = %artifact.id,
                agent = %artifact.agent_id,
                "dispatch rejected by rate limit"
            );
            return false;
        }

        // The send is already counted; sink errors do not un-count it.
        if let Err(e) = self.sink.deliver(artifact) {
            tracing::error!(artifact_id = %artifact.id, error = %e, "sink delivery failed");
        }
        true
    }

    /// Current (minute, hour) window occupancy.
    pub fn window_counts(&self) -> (usize, usize) {
        let windows = self.windows.lock().expect("dispatcher lock poisoned");
        (windows.minute.len(), windows.hour.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    fn artifact() -> OutboundArtifact {
        let item = WorkItem::new("p", vec![], Priority::Low);
        OutboundArtifact::response_to(&item, "a1")
    }

    fn dispatcher(per_minute: usize, per_hour: usize) -> (RateLimitedDispatcher, Arc<MemorySink>) {
        let sink = MemorySink::new();
        let d = RateLimitedDispatcher::new(per_minute, per_hour, sink.clone());
        (d, sink)
    }

    #[test]
    fn test_sends_under_cap_accepted() {
        let (d, sink) = dispatcher(5, 100);
        for _ in 0..5 {
            assert!(d.try_send(&artifact()));
        }
        assert_eq!(sink.sent_count(), 5);
    }

    #[test]
    fn test_sixth_send_within_minute_rejected() {
        let (d, sink) = dispatcher(5, 100);
        let base = Instant::now();
        for i in 0..5 {
            assert!(d.admit_at(base + Duration::from_secs(i)));
        }
        assert!(!d.admit_at(base + Duration::from_secs(5)));
        // Rejection leaves no trace in the windows.
        assert_eq!(d.window_counts().0, 5);
        assert_eq!(sink.sent_count(), 0); // admit_at alone does no I/O
    }

    #[test]
    fn test_window_slides_after_a_minute() {
        let (d, _sink) = dispatcher(5, 100);
        let base = Instant::now();
        for i in 0..5 {
            assert!(d.admit_at(base + Duration::from_secs(i)));
        }
        assert!(!d.admit_at(base + Duration::from_secs(30)));
        // 61s after the first send, one slot has slid out.
        assert!(d.admit_at(base + Duration::from_secs(61)));
    }

    #[test]
    fn test_hour_cap_enforced_independently() {
        let (d, _sink) = dispatcher(100, 3);
        let base = Instant::now();
        // Spread over minutes so the minute window never fills.
        assert!(d.admit_at(base));
        assert!(d.admit_at(base + Duration::from_secs(120)));
        assert!(d.admit_at(base + Duration::from_secs(240)));
        assert!(!d.admit_at(base + Duration::from_secs(360)));
        // Slides out an hour after the first send.
        assert!(d.admit_at(base + Duration::from_secs(3601)));
    }

    #[test]
    fn test_rejected_send_does_not_reach_sink() {
        let (d, sink) = dispatcher(1, 100);
        assert!(d.try_send(&artifact()));
        assert!(!d.try_send(&artifact()));
        assert_eq!(sink.sent_count(), 1);
    }

    #[test]
    fn test_artifact_response_to() {
        let item = WorkItem::new("p", vec![], Priority::High);
        let a = OutboundArtifact::response_to(&item, "agent-7");
        assert_eq!(a.in_reply_to, item.id);
        assert_eq!(a.agent_id, "agent-7");
        assert!(a.id.starts_with("resp-"));
    }

    #[test]
    fn test_window_counts() {
        let (d, _sink) = dispatcher(10, 10);
        assert_eq!(d.window_counts(), (0, 0));
        d.try_send(&artifact());
        d.try_send(&artifact());
        assert_eq!(d.window_counts(), (2, 2));
    }
}
