//! Work item routing: pick the best candidate agent for an item.
//!
//! Candidates come from the mailbox-to-agent mapping when the item names a
//! known mailbox, otherwise from capability-tag intersection. Each
//! candidate is scored on queue depth, specialization, configured pace,
//! and historical success rate; ties break on lowest queue depth, then
//! stable agent-id order, so identical inputs always route identically.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::profile::{AgentRecord, AgentStats};
use crate::domain::WorkItem;
use crate::error::{Result, WarpsimError};

/// Selects a target agent for incoming work items.
pub struct AgentRouter {
    agents: Vec<Arc<AgentRecord>>,
    mailbox_map: HashMap<String, usize>,
}

impl AgentRouter {
    /// Build a router over the agent roster. Mailbox assignments come from
    /// each agent's profile.
    pub fn new(agents: Vec<Arc<AgentRecord>>) -> Self {
        let mut mailbox_map = HashMap::new();
        for (idx, agent) in agents.iter().enumerate() {
            for mailbox in &agent.profile.mailboxes {
                mailbox_map.insert(mailbox.clone(), idx);
            }
        }
        Self { agents, mailbox_map }
    }

    /// Score one candidate against an item, given a consistent snapshot of
    /// its stats and queue depth.
    fn score(agent: &AgentRecord, stats: &AgentStats, queue_depth: usize, item: &WorkItem) -> f64 {
        let specialization = if agent.profile.specializes_in(&item.required_tags) {
            1.0
        } else {
            0.0
        };
        100.0 - 10.0 * queue_depth as f64
            + 50.0 * specialization
            + 20.0 * (2.0 - agent.profile.speed_multiplier)
            + 2.0 * (stats.success_rate_percent - 80.0)
    }

    fn candidates(&self, item: &WorkItem) -> Vec<&Arc<AgentRecord>> {
        if let Some(mailbox) = &item.mailbox
            && let Some(&idx) = self.mailbox_map.get(mailbox)
        {
            return vec![&self.agents[idx]];
        }
        self.agents
            .iter()
            .filter(|a| a.profile.can_handle(&item.required_tags))
            .collect()
    }

    /// Select the best agent for the item.
    ///
    /// A `RoutingMiss` is recoverable: the caller decides what to do with
    /// the unroutable item; nothing has been enqueued.
    pub fn select_agent(&self, item: &WorkItem) -> Result<Arc<AgentRecord>> {
        let candidates = self.candidates(item);
        if candidates.is_empty() {
            return Err(WarpsimError::RoutingMiss(item.id.clone()));
        }

        // Sample each candidate's depth and stats once, so the score and
        // the tie-break see the same values.
        let mut scored: Vec<(f64, usize, &Arc<AgentRecord>)> = candidates
            .into_iter()
            .map(|agent| {
                let depth = agent.queue_depth();
                let stats = agent.stats_snapshot();
                (Self::score(agent, &stats, depth, item), depth, agent)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.id().cmp(b.2.id()))
        });

        let (score, depth, best) = scored[0];
        tracing::debug!(
            item_id = %item.id,
            agent = %best.id(),
            score = score,
            queue_depth = depth,
            "item routed"
        );
        Ok(Arc::clone(best))
    }

    /// The full roster, in construction order.
    pub fn agents(&self) -> &[Arc<AgentRecord>] {
        &self.agents
    }
}
