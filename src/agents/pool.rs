//! Agent worker pool: one long-running worker task per agent.
//!
//! Each worker drains its own queue, computes a dilated processing
//! duration, simulates failure/escalation through the injected policy,
//! sleeps interruptibly, updates its agent's stats, and optionally hands a
//! response artifact to the dispatcher. Per-item errors are isolated to
//! that item; a worker never dies between items. Shutdown is cooperative:
//! the stop flag is observed between dequeue attempts and at short
//! intervals inside the processing sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::agents::policy::OutcomePolicy;
use crate::agents::profile::AgentRecord;
use crate::clock::VirtualClock;
use crate::config::BaseMinutes;
use crate::dispatch::{OutboundArtifact, RateLimitedDispatcher};
use crate::domain::{CompletionRecord, ItemOutcome, WorkItem};
use crate::record::ItemRecorder;

/// How long one dequeue attempt waits; bounds shutdown latency.
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(250);

/// Granularity of the stop-flag check inside a processing sleep.
const SLEEP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Dependencies shared by every worker.
pub struct WorkerDeps {
    pub clock: Arc<VirtualClock>,
    pub policy: Arc<dyn OutcomePolicy>,
    pub dispatcher: Arc<RateLimitedDispatcher>,
    pub recorder: Arc<dyn ItemRecorder>,
    pub base_minutes: BaseMinutes,
}

/// Running workers, one per agent.
pub struct AgentWorkerPool {
    handles: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl AgentWorkerPool {
    /// Spawn one worker task per agent. Workers run until the stop flag
    /// is raised.
    pub fn spawn(
        agents: &[Arc<AgentRecord>],
        deps: Arc<WorkerDeps>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let handles = agents
            .iter()
            .map(|agent| {
                let agent = Arc::clone(agent);
                let deps = Arc::clone(&deps);
                let stop = Arc::clone(&stop);
                tokio::spawn(run_worker(agent, deps, stop))
            })
            .collect();
        Self { handles, stop }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Raise the stop flag and wait for every worker to exit.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = ?e, "worker task panicked");
            }
        }
    }
}

async fn run_worker(agent: Arc<AgentRecord>, deps: Arc<WorkerDeps>, stop: Arc<AtomicBool>) {
    tracing::info!(agent = %agent.id(), "worker started");
    while !stop.load(Ordering::SeqCst) {
        let Some(item) = agent.queue.dequeue(DEQUEUE_TIMEOUT).await else {
            continue;
        };
        process_item(&agent, &deps, &stop, item).await;
    }
    tracing::info!(agent = %agent.id(), "worker stopped");
}

/// Drive one item to a terminal state.
async fn process_item(
    agent: &AgentRecord,
    deps: &WorkerDeps,
    stop: &AtomicBool,
    item: WorkItem,
) {
    let profile = &agent.profile;

    // Simulated processing minutes charged to this item.
    let sim_minutes = deps.base_minutes.for_priority(item.priority) * profile.speed_multiplier;

    // The clock multiplier is captured once here; a speed change while the
    // item is in flight neither truncates nor extends it.
    let wall_secs = if profile.honor_dilation {
        sim_minutes * 60.0 / deps.clock.multiplier()
    } else {
        sim_minutes * 60.0
    };

    if deps.policy.should_fail(&profile.id, profile.failure_rate) {
        tracing::debug!(agent = %profile.id, item_id = %item.id, "simulated failure");
        agent.stats.lock().unwrap().record_failed();
        record_terminal(deps, agent, &item, ItemOutcome::Failed, sim_minutes);
        return;
    }

    if deps.policy.complexity_draw(&profile.id) > profile.escalation_threshold {
        tracing::debug!(agent = %profile.id, item_id = %item.id, "item escalated");
        agent.stats.lock().unwrap().record_escalated();
        record_terminal(deps, agent, &item, ItemOutcome::Escalated, sim_minutes);
        return;
    }

    if !interruptible_sleep(Duration::from_secs_f64(wall_secs), stop).await {
        // Shutdown arrived mid-processing; the item is abandoned without a
        // terminal record rather than reported with a shortened duration.
        tracing::warn!(agent = %profile.id, item_id = %item.id, "shutdown during processing");
        return;
    }

    agent.stats.lock().unwrap().record_completed(sim_minutes);
    record_terminal(deps, agent, &item, ItemOutcome::Completed, sim_minutes);
    tracing::debug!(
        agent = %profile.id,
        item_id = %item.id,
        sim_minutes = sim_minutes,
        "item completed"
    );

    if profile.auto_respond {
        let artifact = OutboundArtifact::response_to(&item, &profile.id);
        if !deps.dispatcher.try_send(&artifact) {
            // The dispatcher never retries; the response is dropped here.
            tracing::warn!(agent = %profile.id, item_id = %item.id, "auto-response dropped");
        }
    }
}

/// Write the terminal record; recorder errors are logged, never fatal to
/// the worker.
fn record_terminal(
    deps: &WorkerDeps,
    agent: &AgentRecord,
    item: &WorkItem,
    outcome: ItemOutcome,
    sim_minutes: f64,
) {
    let record = CompletionRecord::new(item, agent.id(), outcome, sim_minutes, deps.clock.now());
    if let Err(e) = deps.recorder.record(&record) {
        tracing::error!(item_id = %item.id, error = %e, "failed to write completion record");
    }
}

/// Sleep for `duration`, checking the stop flag at short intervals.
/// Returns `false` if the sleep was cut short by shutdown.
async fn interruptible_sleep(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        let step = (deadline - now).min(SLEEP_CHECK_INTERVAL);
        tokio::time::sleep(step).await;
    }
}
