//! The virtual clock: a piecewise-linear mapping from wall time to
//! simulated time under a runtime-mutable multiplier.
//!
//! Every mutation (speed change, pause/resume fold, reset) publishes a new
//! immutable snapshot; readers grab the current snapshot and compute from
//! it without further locking, so they never observe a torn state. The
//! mapping stays single-segment by folding the simulated time reached so
//! far into a new (wall anchor, sim anchor) pair at each change, which
//! guarantees continuity: simulated time never jumps at a speed change.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::clock::speed::{SpeedLevel, SpeedTable};
use crate::error::{Result, WarpsimError};

/// Immutable clock state, swapped whole on every mutation.
#[derive(Debug, Clone)]
struct ClockSnapshot {
    /// Wall instant of the current segment's origin
    wall_anchor: Instant,
    /// Simulated elapsed seconds at `wall_anchor`
    sim_anchor: f64,
    /// Active speed level
    level: SpeedLevel,
    /// Set while paused; simulated time is frozen at this wall instant
    paused_at: Option<Instant>,
    /// Wall instant of the last reset (or construction)
    started_at: Instant,
    /// Wall-clock datetime of the last reset, base for `sim_datetime`
    started_at_utc: DateTime<Utc>,
}

impl ClockSnapshot {
    /// Simulated elapsed seconds at the given wall instant.
    fn sim_at(&self, now: Instant) -> f64 {
        let effective = match self.paused_at {
            Some(paused) => paused.min(now),
            None => now,
        };
        let wall_secs = effective.duration_since(self.wall_anchor).as_secs_f64();
        self.sim_anchor + wall_secs * self.level.multiplier
    }
}

/// Converts between wall-clock elapsed time and simulated elapsed time.
///
/// `now()` is a pure function of the published snapshot and is safe to call
/// from any task. Mutations validate their arguments before touching state.
pub struct VirtualClock {
    table: SpeedTable,
    state: RwLock<Arc<ClockSnapshot>>,
}

impl VirtualClock {
    /// Create a clock running at the table's base level.
    pub fn new(table: SpeedTable) -> Result<Self> {
        table.validate()?;
        let level = table.base();
        Ok(Self {
            state: RwLock::new(Arc::new(Self::fresh_snapshot(level))),
            table,
        })
    }

    /// Create a clock starting at a specific level.
    pub fn with_level(table: SpeedTable, level: u8) -> Result<Self> {
        let clock = Self::new(table)?;
        clock.set_speed(level)?;
        Ok(clock)
    }

    fn fresh_snapshot(level: SpeedLevel) -> ClockSnapshot {
        let now = Instant::now();
        ClockSnapshot {
            wall_anchor: now,
            sim_anchor: 0.0,
            level,
            paused_at: None,
            started_at: now,
            started_at_utc: Utc::now(),
        }
    }

    fn snapshot(&self) -> Arc<ClockSnapshot> {
        self.state.read().expect("clock lock poisoned").clone()
    }

    /// Current simulated elapsed seconds since start (or last reset).
    pub fn now(&self) -> f64 {
        self.snapshot().sim_at(Instant::now())
    }

    /// Simulated timeline presented as a calendar datetime.
    pub fn sim_datetime(&self) -> DateTime<Utc> {
        let snap = self.snapshot();
        let sim = snap.sim_at(Instant::now());
        snap.started_at_utc + chrono::Duration::milliseconds((sim * 1000.0) as i64)
    }

    /// Wall time elapsed since start (or last reset), pauses included.
    pub fn wall_elapsed(&self) -> Duration {
        self.snapshot().started_at.elapsed()
    }

    /// The active speed level.
    pub fn active_level(&self) -> SpeedLevel {
        self.snapshot().level
    }

    /// The active multiplier.
    pub fn multiplier(&self) -> f64 {
        self.snapshot().level.multiplier
    }

    /// Poll cadence for the active level.
    pub fn poll_interval(&self) -> Duration {
        self.snapshot().level.poll_interval()
    }

    /// Whether the clock is currently paused.
    pub fn is_paused(&self) -> bool {
        self.snapshot().paused_at.is_some()
    }

    /// The configured speed table.
    pub fn table(&self) -> &SpeedTable {
        &self.table
    }

    /// Switch the active speed level.
    ///
    /// Folds the simulated time reached so far into a new anchor pair, so
    /// the new multiplier applies only to wall time elapsed after the swap
    /// and `now()` is continuous across the change. Unknown levels are
    /// rejected before any state mutation.
    pub fn set_speed(&self, level: u8) -> Result<SpeedLevel> {
        let new_level = self.table.get(level).ok_or_else(|| {
            WarpsimError::InvalidArgument(format!("speed level {} not configured", level))
        })?;

        let mut guard = self.state.write().expect("clock lock poisoned");
        let now = Instant::now();
        let old = guard.as_ref();
        let folded = ClockSnapshot {
            wall_anchor: now,
            sim_anchor: old.sim_at(now),
            level: new_level,
            // stay frozen if paused, anchored at the fold point
            paused_at: old.paused_at.map(|_| now),
            started_at: old.started_at,
            started_at_utc: old.started_at_utc,
        };
        *guard = Arc::new(folded);

        tracing::info!(
            level = new_level.level,
            multiplier = new_level.multiplier,
            "speed level changed"
        );
        Ok(new_level)
    }

    /// Freeze simulated time. No-op if already paused.
    pub fn pause(&self) {
        let mut guard = self.state.write().expect("clock lock poisoned");
        if guard.paused_at.is_some() {
            return;
        }
        let mut snap = guard.as_ref().clone();
        snap.paused_at = Some(Instant::now());
        *guard = Arc::new(snap);
        tracing::info!("clock paused");
    }

    /// Unfreeze simulated time. No-op if not paused.
    ///
    /// The paused wall span is excluded from simulated elapsed time by
    /// folding the frozen simulated value into a new anchor at resume.
    pub fn resume(&self) {
        let mut guard = self.state.write().expect("clock lock poisoned");
        let Some(paused_at) = guard.paused_at else {
            return;
        };
        let now = Instant::now();
        let old = guard.as_ref();
        let folded = ClockSnapshot {
            wall_anchor: now,
            sim_anchor: old.sim_at(paused_at),
            level: old.level,
            paused_at: None,
            started_at: old.started_at,
            started_at_utc: old.started_at_utc,
        };
        *guard = Arc::new(folded);
        tracing::info!("clock resumed");
    }

    /// Reinitialize the clock to "now", clearing pause accounting.
    /// The active level is kept. Used only at explicit operator request.
    pub fn reset(&self) {
        let mut guard = self.state.write().expect("clock lock poisoned");
        let level = guard.level;
        *guard = Arc::new(Self::fresh_snapshot(level));
        tracing::info!("clock reset");
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("VirtualClock")
            .field("level", &snap.level.level)
            .field("multiplier", &snap.level.multiplier)
            .field("paused", &snap.paused_at.is_some())
            .field("sim_now", &snap.sim_at(Instant::now()))
            .finish()
    }
}
