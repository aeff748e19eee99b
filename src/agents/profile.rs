//! Agent configuration and statistics.
//!
//! `AgentProfile` is the typed, validated form of one agent's configuration.
//! Unknown fields in the source YAML are a startup error, not a silent
//! default. `AgentStats` is written only by the agent's own worker and read
//! concurrently by the router; readers tolerate a stale snapshot.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WarpsimError};
use crate::queue::PriorityWorkQueue;

fn default_true() -> bool {
    true
}

/// Typed per-agent configuration, loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentProfile {
    /// Stable agent identifier
    pub id: String,

    /// Tags this agent can handle; an item must intersect them
    #[serde(rename = "capability-tags")]
    pub capability_tags: Vec<String>,

    /// Tags the agent is especially good at (router score bonus)
    #[serde(default)]
    pub specialties: Vec<String>,

    /// Per-agent pace factor applied to base processing minutes
    #[serde(rename = "speed-multiplier")]
    pub speed_multiplier: f64,

    /// Whether the agent synthesizes a response artifact on completion
    #[serde(rename = "auto-respond")]
    pub auto_respond: bool,

    /// Complexity draws above this threshold escalate the item
    #[serde(rename = "escalation-threshold")]
    pub escalation_threshold: f64,

    /// Probability an item is marked failed
    #[serde(rename = "failure-rate")]
    pub failure_rate: f64,

    /// Whether processing duration is divided by the clock multiplier
    #[serde(rename = "honor-dilation", default = "default_true")]
    pub honor_dilation: bool,

    /// Mailboxes routed directly to this agent
    #[serde(default)]
    pub mailboxes: Vec<String>,
}

impl AgentProfile {
    /// Validate one profile; called for every agent at load time.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(WarpsimError::Config("agent id must not be empty".to_string()));
        }
        if self.capability_tags.is_empty() {
            return Err(WarpsimError::Config(format!(
                "agent {} has no capability tags",
                self.id
            )));
        }
        if self.speed_multiplier <= 0.0 {
            return Err(WarpsimError::Config(format!(
                "agent {} has non-positive speed multiplier {}",
                self.id, self.speed_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(WarpsimError::Config(format!(
                "agent {} failure rate {} outside [0, 1]",
                self.id, self.failure_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.escalation_threshold) {
            return Err(WarpsimError::Config(format!(
                "agent {} escalation threshold {} outside [0, 1]",
                self.id, self.escalation_threshold
            )));
        }
        Ok(())
    }

    /// Whether the item's tags intersect this agent's capabilities.
    pub fn can_handle(&self, required_tags: &[String]) -> bool {
        required_tags.iter().any(|t| self.capability_tags.contains(t))
    }

    /// Whether the item's tags intersect this agent's specialties.
    pub fn specializes_in(&self, required_tags: &[String]) -> bool {
        required_tags.iter().any(|t| self.specialties.contains(t))
    }
}

/// Per-agent counters, updated only by the owning worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentStats {
    /// Items driven to `completed`
    pub processed: u64,
    /// Items driven to `failed`
    pub failed: u64,
    /// Items driven to `escalated`
    pub escalated: u64,
    /// Incremental mean of simulated processing minutes over completed items
    pub average_processing_minutes: f64,
    /// processed / (processed + failed), as a percentage
    pub success_rate_percent: f64,
}

impl AgentStats {
    /// Record a completed item with its simulated processing minutes.
    pub fn record_completed(&mut self, minutes: f64) {
        self.processed += 1;
        let n = self.processed as f64;
        self.average_processing_minutes += (minutes - self.average_processing_minutes) / n;
        self.recompute_success_rate();
    }

    /// Record a failed item.
    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.recompute_success_rate();
    }

    /// Record an escalated item.
    pub fn record_escalated(&mut self) {
        self.escalated += 1;
    }

    fn recompute_success_rate(&mut self) {
        let attempts = self.processed + self.failed;
        self.success_rate_percent = if attempts == 0 {
            100.0
        } else {
            self.processed as f64 / attempts as f64 * 100.0
        };
    }

    /// Total items driven to any terminal state.
    pub fn total(&self) -> u64 {
        self.processed + self.failed + self.escalated
    }
}

/// Runtime record for one agent: profile, queue, and stats.
///
/// Created at startup, never destroyed during a run. The queue is written
/// by the router and drained by the agent's worker; the stats are written
/// only by that worker.
pub struct AgentRecord {
    pub profile: AgentProfile,
    pub queue: Arc<PriorityWorkQueue>,
    pub stats: Arc<Mutex<AgentStats>>,
}

impl AgentRecord {
    pub fn new(profile: AgentProfile) -> Self {
        Self {
            profile,
            queue: Arc::new(PriorityWorkQueue::new()),
            stats: Arc::new(Mutex::new(AgentStats::default())),
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    /// Point-in-time copy of the stats; may be momentarily stale.
    pub fn stats_snapshot(&self) -> AgentStats {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }
}

impl std::fmt::Debug for AgentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRecord")
            .field("id", &self.profile.id)
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, tags: &[&str]) -> AgentProfile {
        AgentProfile {
            id: id.to_string(),
            capability_tags: tags.iter().map(|t| t.to_string()).collect(),
            specialties: vec![],
            speed_multiplier: 1.0,
            auto_respond: false,
            escalation_threshold: 1.0,
            failure_rate: 0.0,
            honor_dilation: true,
            mailboxes: vec![],
        }
    }

    #[test]
    fn test_profile_validate_ok() {
        assert!(profile("a1", &["billing"]).validate().is_ok());
    }

    #[test]
    fn test_profile_empty_id_rejected() {
        assert!(profile("", &["billing"]).validate().is_err());
    }

    #[test]
    fn test_profile_no_tags_rejected() {
        assert!(profile("a1", &[]).validate().is_err());
    }

    #[test]
    fn test_profile_bad_rates_rejected() {
        let mut p = profile("a1", &["billing"]);
        p.failure_rate = 1.5;
        assert!(p.validate().is_err());

        let mut p = profile("a1", &["billing"]);
        p.escalation_threshold = -0.1;
        assert!(p.validate().is_err());

        let mut p = profile("a1", &["billing"]);
        p.speed_multiplier = 0.0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_unknown_yaml_field_rejected() {
        let yaml = r#"
id: a1
capability-tags: [billing]
speed-multiplier: 1.0
auto-respond: false
escalation-threshold: 0.9
failure-rate: 0.0
surprise-field: true
"#;
        let parsed: std::result::Result<AgentProfile, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_missing_required_yaml_field_rejected() {
        let yaml = r#"
id: a1
capability-tags: [billing]
"#;
        let parsed: std::result::Result<AgentProfile, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_can_handle_intersection() {
        let p = profile("a1", &["billing", "sales"]);
        assert!(p.can_handle(&["sales".to_string()]));
        assert!(!p.can_handle(&["legal".to_string()]));
        assert!(!p.can_handle(&[]));
    }

    #[test]
    fn test_specializes_in() {
        let mut p = profile("a1", &["billing", "sales"]);
        p.specialties = vec!["sales".to_string()];
        assert!(p.specializes_in(&["sales".to_string()]));
        assert!(!p.specializes_in(&["billing".to_string()]));
    }

    #[test]
    fn test_stats_incremental_mean() {
        let mut stats = AgentStats::default();
        stats.record_completed(10.0);
        stats.record_completed(20.0);
        stats.record_completed(30.0);
        assert!((stats.average_processing_minutes - 20.0).abs() < 1e-9);
        assert_eq!(stats.processed, 3);
    }

    #[test]
    fn test_stats_success_rate() {
        let mut stats = AgentStats::default();
        assert_eq!(stats.success_rate_percent, 0.0); // default, no attempts yet
        stats.record_completed(10.0);
        assert_eq!(stats.success_rate_percent, 100.0);
        stats.record_failed();
        assert!((stats.success_rate_percent - 50.0).abs() < 1e-9);
        stats.record_completed(10.0);
        stats.record_completed(10.0);
        assert!((stats.success_rate_percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_escalated_does_not_affect_success_rate() {
        let mut stats = AgentStats::default();
        stats.record_completed(10.0);
        stats.record_escalated();
        stats.record_escalated();
        assert_eq!(stats.success_rate_percent, 100.0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_record_snapshot_is_copy() {
        let record = AgentRecord::new(profile("a1", &["billing"]));
        let snap = record.stats_snapshot();
        record.stats.lock().unwrap().record_failed();
        // The earlier snapshot is unaffected.
        assert_eq!(snap.failed, 0);
        assert_eq!(record.stats_snapshot().failed, 1);
    }
}
