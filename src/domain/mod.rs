//! Domain types for warpsim
//!
//! Work items, priority classes, terminal outcomes, and completion records.

pub mod item;

pub use item::{CompletionRecord, ItemOutcome, Priority, WorkItem};
