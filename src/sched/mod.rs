//! Scheduling against the simulated timeline.
//!
//! `EventScheduler` fires one-shot callbacks after a simulated delay;
//! `CycleManager` rolls the fixed-length simulated period over. Both are
//! driven by the engine's poll loop at the active level's cadence.

pub mod cycle;
pub mod events;

pub use cycle::CycleManager;
pub use events::{EventHandle, EventScheduler};
