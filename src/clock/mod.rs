//! Virtual clock: wall-clock to simulated-time mapping.
//!
//! The clock presents an accelerated timeline derived from wall time via a
//! runtime-selectable speed level. Changing the multiplier never produces a
//! discontinuity in simulated time.

pub mod speed;
pub mod virtual_clock;

pub use speed::{SpeedLevel, SpeedTable};
pub use virtual_clock::VirtualClock;
