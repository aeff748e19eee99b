//! Work item types and terminal records.
//!
//! A `WorkItem` is a unit of processing routed to exactly one agent's queue.
//! Ownership passes from the producer to the queue to the worker that
//! dequeues it; the worker drives it to a terminal `ItemOutcome` and emits
//! one `CompletionRecord` per item.

use serde::{Deserialize, Serialize};

use crate::id::{generate_item_id, now_ms};

/// Priority class of a work item.
///
/// Totally ordered: `Urgent < High < Medium < Low`, lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All priority classes in sort order.
    pub const ALL: [Priority; 4] = [
        Priority::Urgent,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Stable lowercase name, matching the config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a processed work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOutcome {
    Completed,
    Failed,
    Escalated,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Completed => "completed",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Escalated => "escalated",
        }
    }
}

/// A unit of work submitted by an external producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique item identifier
    pub id: String,
    /// Opaque payload (body generation is out of scope for this core)
    pub payload: String,
    /// Capability tags an agent must intersect to handle this item
    pub required_tags: Vec<String>,
    /// Priority class
    pub priority: Priority,
    /// Mailbox this item arrived on, if any (direct agent mapping)
    pub mailbox: Option<String>,
    /// Unix timestamp in milliseconds at submission
    pub submitted_at: u64,
}

impl WorkItem {
    /// Create a new work item with a generated ID.
    pub fn new(payload: &str, required_tags: Vec<String>, priority: Priority) -> Self {
        Self {
            id: generate_item_id(),
            payload: payload.to_string(),
            required_tags,
            priority,
            mailbox: None,
            submitted_at: now_ms(),
        }
    }

    /// Attach the mailbox the item arrived on.
    pub fn via_mailbox(mut self, mailbox: &str) -> Self {
        self.mailbox = Some(mailbox.to_string());
        self
    }
}

/// One record per terminal item, written to the completion log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRecord {
    /// Item this record describes
    pub item_id: String,
    /// Agent that drove the item to a terminal state
    pub agent_id: String,
    /// Terminal outcome
    pub outcome: ItemOutcome,
    /// Priority class the item carried
    pub priority: Priority,
    /// Simulated processing minutes charged to the item
    pub processing_minutes: f64,
    /// Simulated elapsed seconds at completion
    pub sim_time_secs: f64,
    /// Wall-clock timestamp of the record
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl CompletionRecord {
    /// Build a record for an item that just reached a terminal state.
    pub fn new(
        item: &WorkItem,
        agent_id: &str,
        outcome: ItemOutcome,
        processing_minutes: f64,
        sim_time_secs: f64,
    ) -> Self {
        Self {
            item_id: item.id.clone(),
            agent_id: agent_id.to_string(),
            outcome,
            priority: item.priority,
            processing_minutes,
            sim_time_secs,
            recorded_at: chrono::Utc::now(),
        }
    }
}
