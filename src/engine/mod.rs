//! Engine composition root.
//!
//! Owns the clock, event scheduler, cycle manager, router, worker pool,
//! and dispatcher; nothing in the crate is a process-wide global. External
//! producers call `submit`, operators drive `set_speed`/`pause`/`resume`/
//! `reset`, and any number of listeners subscribe to state-change
//! notifications over a bounded broadcast channel — a slow listener loses
//! messages rather than blocking the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::agents::pool::{AgentWorkerPool, WorkerDeps};
use crate::agents::profile::{AgentRecord, AgentStats};
use crate::agents::{AgentRouter, OutcomePolicy};
use crate::clock::VirtualClock;
use crate::config::EngineConfig;
use crate::dispatch::{DispatchSink, RateLimitedDispatcher};
use crate::domain::WorkItem;
use crate::error::{Result, WarpsimError};
use crate::record::ItemRecorder;
use crate::sched::{CycleManager, EventScheduler};

/// Capacity of the state-change broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State-change notification delivered best-effort to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SpeedChanged { level: u8, multiplier: f64 },
    CycleRolledOver { cycle: u64 },
    Paused,
    Resumed,
    Reset,
}

/// Per-agent view in the status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct AgentStatusReport {
    pub agent_id: String,
    pub queue_depth: usize,
    #[serde(flatten)]
    pub stats: AgentStats,
}

/// Point-in-time engine status. Always reflects the last consistently
/// computed state; individual agent stats may be momentarily stale.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub speed_level: u8,
    pub multiplier: f64,
    pub paused: bool,
    pub sim_elapsed_secs: f64,
    pub sim_datetime: DateTime<Utc>,
    pub wall_elapsed_secs: f64,
    pub cycle_number: u64,
    pub submitted_this_cycle: u64,
    pub agents: Vec<AgentStatusReport>,
}

/// The time-dilation scheduling engine and task-processing core.
pub struct Engine {
    clock: Arc<VirtualClock>,
    scheduler: Arc<EventScheduler>,
    agents: Vec<Arc<AgentRecord>>,
    router: AgentRouter,
    dispatcher: Arc<RateLimitedDispatcher>,
    recorder: Arc<dyn ItemRecorder>,
    policy: Arc<dyn OutcomePolicy>,
    config: EngineConfig,
    cycle: Arc<Mutex<CycleManager>>,
    cycle_count: Arc<AtomicU64>,
    submitted_this_cycle: Arc<AtomicU64>,
    events_tx: broadcast::Sender<EngineEvent>,
    stop: Arc<AtomicBool>,
    pool: Option<AgentWorkerPool>,
    poll_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Build an engine from validated configuration and injected
    /// collaborators. No tasks run until `start()`.
    pub fn new(
        config: EngineConfig,
        policy: Arc<dyn OutcomePolicy>,
        sink: Arc<dyn DispatchSink>,
        recorder: Arc<dyn ItemRecorder>,
    ) -> Result<Self> {
        config.validate()?;

        let clock = Arc::new(VirtualClock::with_level(
            config.speed_levels.clone(),
            config.initial_level,
        )?);
        let scheduler = Arc::new(EventScheduler::new(Arc::clone(&clock)));

        let agents: Vec<Arc<AgentRecord>> = config
            .agents
            .iter()
            .map(|profile| Arc::new(AgentRecord::new(profile.clone())))
            .collect();
        let router = AgentRouter::new(agents.clone());

        let dispatcher = Arc::new(RateLimitedDispatcher::new(
            config.rate_limit.per_minute,
            config.rate_limit.per_hour,
            sink,
        ));

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cycle_count = Arc::new(AtomicU64::new(0));
        let submitted_this_cycle = Arc::new(AtomicU64::new(0));

        let rollover_tx = events_tx.clone();
        let rollover_count = Arc::clone(&cycle_count);
        let rollover_submitted = Arc::clone(&submitted_this_cycle);
        let cycle = CycleManager::new(
            config.cycle.length_sim_secs,
            Box::new(move |cycle| {
                rollover_count.store(cycle, Ordering::SeqCst);
                rollover_submitted.store(0, Ordering::SeqCst);
                let _ = rollover_tx.send(EngineEvent::CycleRolledOver { cycle });
                Ok(())
            }),
        )?;

        Ok(Self {
            clock,
            scheduler,
            agents,
            router,
            dispatcher,
            recorder,
            policy,
            config,
            cycle: Arc::new(Mutex::new(cycle)),
            cycle_count,
            submitted_this_cycle,
            events_tx,
            stop: Arc::new(AtomicBool::new(false)),
            pool: None,
            poll_handle: None,
        })
    }

    /// Spawn the worker pool and the poll loop. Idempotent.
    pub fn start(&mut self) {
        if self.pool.is_some() {
            return;
        }

        let deps = Arc::new(WorkerDeps {
            clock: Arc::clone(&self.clock),
            policy: Arc::clone(&self.policy),
            dispatcher: Arc::clone(&self.dispatcher),
            recorder: Arc::clone(&self.recorder),
            base_minutes: self.config.base_minutes,
        });
        self.pool = Some(AgentWorkerPool::spawn(
            &self.agents,
            deps,
            Arc::clone(&self.stop),
        ));

        let clock = Arc::clone(&self.clock);
        let scheduler = Arc::clone(&self.scheduler);
        let cycle = Arc::clone(&self.cycle);
        let stop = Arc::clone(&self.stop);
        self.poll_handle = Some(tokio::spawn(async move {
            tracing::info!("poll loop started");
            while !stop.load(Ordering::SeqCst) {
                scheduler.tick();
                cycle.lock().unwrap().tick(&clock);
                // Cadence follows the active level, re-read every pass so a
                // speed change takes effect on the next tick.
                tokio::time::sleep(clock.poll_interval()).await;
            }
            tracing::info!("poll loop stopped");
        }));

        tracing::info!(agents = self.agents.len(), "engine started");
    }

    /// Stop the poll loop and every worker, waiting for them to exit.
    pub async fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.poll_handle.take() {
            let _ = handle.await;
        }
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await;
        }
        tracing::info!("engine shut down");
    }

    /// Submit a work item: route it and enqueue on the selected agent.
    ///
    /// Returns the chosen agent id. A `RoutingMiss` is recoverable; the
    /// item has not been enqueued anywhere.
    pub fn submit(&self, item: WorkItem) -> Result<String> {
        if item.id.is_empty() {
            return Err(WarpsimError::InvalidArgument("item id must not be empty".to_string()));
        }
        if item.required_tags.is_empty() && item.mailbox.is_none() {
            return Err(WarpsimError::InvalidArgument(format!(
                "item {} has neither capability tags nor a mailbox",
                item.id
            )));
        }

        let agent = self.router.select_agent(&item)?;
        agent.queue.enqueue(item);
        self.submitted_this_cycle.fetch_add(1, Ordering::SeqCst);
        Ok(agent.id().to_string())
    }

    /// Switch the active speed level.
    pub fn set_speed(&self, level: u8) -> Result<()> {
        let new_level = self.clock.set_speed(level)?;
        let _ = self.events_tx.send(EngineEvent::SpeedChanged {
            level: new_level.level,
            multiplier: new_level.multiplier,
        });
        Ok(())
    }

    /// Freeze simulated time. No-op if already paused.
    pub fn pause(&self) {
        if self.clock.is_paused() {
            return;
        }
        self.clock.pause();
        let _ = self.events_tx.send(EngineEvent::Paused);
    }

    /// Unfreeze simulated time. No-op if not paused.
    pub fn resume(&self) {
        if !self.clock.is_paused() {
            return;
        }
        self.clock.resume();
        let _ = self.events_tx.send(EngineEvent::Resumed);
    }

    /// Reinitialize the simulated timeline and cycle bookkeeping. Lifetime
    /// per-agent stats survive; cycle-scoped counters do not.
    pub fn reset(&self) {
        self.clock.reset();
        self.cycle.lock().unwrap().restart_at(0.0);
        self.cycle_count.store(0, Ordering::SeqCst);
        self.submitted_this_cycle.store(0, Ordering::SeqCst);
        let _ = self.events_tx.send(EngineEvent::Reset);
    }

    /// Subscribe to state-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> EngineStatus {
        let level = self.clock.active_level();
        EngineStatus {
            speed_level: level.level,
            multiplier: level.multiplier,
            paused: self.clock.is_paused(),
            sim_elapsed_secs: self.clock.now(),
            sim_datetime: self.clock.sim_datetime(),
            wall_elapsed_secs: self.clock.wall_elapsed().as_secs_f64(),
            cycle_number: self.cycle_count.load(Ordering::SeqCst),
            submitted_this_cycle: self.submitted_this_cycle.load(Ordering::SeqCst),
            agents: self
                .agents
                .iter()
                .map(|agent| AgentStatusReport {
                    agent_id: agent.id().to_string(),
                    queue_depth: agent.queue_depth(),
                    stats: agent.stats_snapshot(),
                })
                .collect(),
        }
    }

    /// The configured agent profiles, in roster order.
    pub fn roster(&self) -> Vec<&crate::agents::AgentProfile> {
        self.agents.iter().map(|a| &a.profile).collect()
    }

    /// The engine's clock, for collaborators that need simulated time.
    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }

    /// The event scheduler, for collaborators that run timed campaigns.
    pub fn scheduler(&self) -> &Arc<EventScheduler> {
        &self.scheduler
    }

    /// The outbound dispatcher.
    pub fn dispatcher(&self) -> &Arc<RateLimitedDispatcher> {
        &self.dispatcher
    }
}
