//! Simulated-period rollover detection.
//!
//! A cycle is a fixed simulated-time span (one simulated week by default).
//! The manager advances `cycle_start_sim` by whole cycle lengths rather
//! than snapping to "now", so skipped cycles at very high multipliers are
//! counted exactly and no drift accumulates.

use crate::clock::VirtualClock;
use crate::error::{Result, WarpsimError};

/// Simulated seconds in one week, the default cycle length.
pub const SIM_WEEK_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Callback invoked once per cycle boundary crossed, with the new count.
pub type RolloverCallback = Box<dyn FnMut(u64) -> Result<()> + Send>;

/// Detects completion of the fixed-length simulated period and fires the
/// rollover callback once per boundary crossed.
pub struct CycleManager {
    cycle_length_secs: f64,
    cycle_start_sim: f64,
    cycle_count: u64,
    on_rollover: RolloverCallback,
}

impl CycleManager {
    /// Create a manager starting its first cycle at simulated time zero.
    pub fn new(cycle_length_secs: f64, on_rollover: RolloverCallback) -> Result<Self> {
        if !cycle_length_secs.is_finite() || cycle_length_secs <= 0.0 {
            return Err(WarpsimError::InvalidArgument(format!(
                "cycle length must be positive, got {}",
                cycle_length_secs
            )));
        }
        Ok(Self {
            cycle_length_secs,
            cycle_start_sim: 0.0,
            cycle_count: 0,
            on_rollover,
        })
    }

    /// Cycles completed so far.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Simulated start time of the current cycle.
    pub fn cycle_start_sim(&self) -> f64 {
        self.cycle_start_sim
    }

    /// Configured cycle length in simulated seconds.
    pub fn cycle_length_secs(&self) -> f64 {
        self.cycle_length_secs
    }

    /// Restart cycle bookkeeping at the given simulated time.
    pub fn restart_at(&mut self, sim_now: f64) {
        self.cycle_start_sim = sim_now;
        self.cycle_count = 0;
    }

    /// Advance against the clock's current simulated time.
    pub fn tick(&mut self, clock: &VirtualClock) -> u64 {
        self.tick_at(clock.now())
    }

    /// Advance against an explicit simulated time; returns the number of
    /// boundaries crossed. If more than one full cycle elapsed since the
    /// last tick, the counter catches up one callback per cycle consumed.
    pub fn tick_at(&mut self, sim_now: f64) -> u64 {
        let mut crossed = 0;
        while sim_now - self.cycle_start_sim >= self.cycle_length_secs {
            self.cycle_start_sim += self.cycle_length_secs;
            self.cycle_count += 1;
            crossed += 1;
            if let Err(e) = (self.on_rollover)(self.cycle_count) {
                tracing::error!(
                    cycle = self.cycle_count,
                    error = %e,
                    "rollover callback failed"
                );
            } else {
                tracing::info!(cycle = self.cycle_count, "cycle rolled over");
            }
        }
        crossed
    }
}

impl std::fmt::Debug for CycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleManager")
            .field("cycle_length_secs", &self.cycle_length_secs)
            .field("cycle_start_sim", &self.cycle_start_sim)
            .field("cycle_count", &self.cycle_count)
            .finish()
    }
}
