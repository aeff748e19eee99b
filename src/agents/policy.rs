//! Injectable failure/escalation decision policy.
//!
//! All randomness in the worker loop flows through this one seam so tests
//! can supply deterministic stubs.

use rand::Rng;

/// Decides simulated processing outcomes for an agent.
pub trait OutcomePolicy: Send + Sync {
    /// Whether the next item should be marked failed. `failure_rate` is the
    /// agent's configured probability in [0, 1].
    fn should_fail(&self, agent_id: &str, failure_rate: f64) -> bool;

    /// A complexity draw in [0, 1); draws above the agent's escalation
    /// threshold escalate the item.
    fn complexity_draw(&self, agent_id: &str) -> f64;
}

/// Production policy backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomPolicy;

impl OutcomePolicy for RandomPolicy {
    fn should_fail(&self, _agent_id: &str, failure_rate: f64) -> bool {
        failure_rate > 0.0 && rand::rng().random::<f64>() < failure_rate
    }

    fn complexity_draw(&self, _agent_id: &str) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Deterministic policy for tests: fixed failure decision and complexity.
#[derive(Debug, Clone, Copy)]
pub struct FixedPolicy {
    pub fail: bool,
    pub complexity: f64,
}

impl FixedPolicy {
    /// Policy under which every item completes.
    pub fn all_complete() -> Self {
        Self { fail: false, complexity: 0.0 }
    }

    /// Policy under which every item fails.
    pub fn all_fail() -> Self {
        Self { fail: true, complexity: 0.0 }
    }

    /// Policy under which every item escalates (complexity above any
    /// threshold below 1.0).
    pub fn all_escalate() -> Self {
        Self { fail: false, complexity: 1.0 }
    }
}

impl OutcomePolicy for FixedPolicy {
    fn should_fail(&self, _agent_id: &str, failure_rate: f64) -> bool {
        // A configured rate of 1.0 always fails even under a non-failing
        // stub, matching the production policy at the boundary.
        self.fail || failure_rate >= 1.0
    }

    fn complexity_draw(&self, _agent_id: &str) -> f64 {
        self.complexity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_policy_zero_rate_never_fails() {
        let policy = RandomPolicy;
        for _ in 0..100 {
            assert!(!policy.should_fail("a1", 0.0));
        }
    }

    #[test]
    fn test_random_policy_full_rate_always_fails() {
        let policy = RandomPolicy;
        for _ in 0..100 {
            assert!(policy.should_fail("a1", 1.0));
        }
    }

    #[test]
    fn test_random_policy_draw_in_range() {
        let policy = RandomPolicy;
        for _ in 0..100 {
            let draw = policy.complexity_draw("a1");
            assert!((0.0..1.0).contains(&draw));
        }
    }

    #[test]
    fn test_fixed_policy_complete() {
        let policy = FixedPolicy::all_complete();
        assert!(!policy.should_fail("a1", 0.5));
        assert_eq!(policy.complexity_draw("a1"), 0.0);
    }

    #[test]
    fn test_fixed_policy_fail() {
        let policy = FixedPolicy::all_fail();
        assert!(policy.should_fail("a1", 0.0));
    }

    #[test]
    fn test_fixed_policy_honors_certain_failure_rate() {
        let policy = FixedPolicy::all_complete();
        assert!(policy.should_fail("a1", 1.0));
    }

    #[test]
    fn test_fixed_policy_escalate() {
        let policy = FixedPolicy::all_escalate();
        assert!(policy.complexity_draw("a1") > 0.9);
    }
}
