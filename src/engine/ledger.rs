use std::collections::HashMap;

use crate::resource::ResourceId;

/// Verdict after recording a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    /// Below budget: the resource goes back on the queue.
    Retry { failures: u32 },
    /// Budget spent: the resource is permanently failed for this run.
    Exhausted { failures: u32 },
}

/// Consecutive failure counts per ledger key, owned by one engine run.
#[derive(Debug)]
pub struct FailureLedger {
    max_failures: u32,
    counts: HashMap<ResourceId, u32>,
}

impl FailureLedger {
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures: max_failures.max(1),
            counts: HashMap::new(),
        }
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn record_failure(&mut self, key: ResourceId) -> Strike {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count < self.max_failures {
            Strike::Retry { failures: *count }
        } else {
            Strike::Exhausted { failures: *count }
        }
    }

    pub fn record_success(&mut self, key: &ResourceId) {
        self.counts.remove(key);
    }

    pub fn failures(&self, key: &ResourceId) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_at_max() {
        let mut ledger = FailureLedger::new(3);
        let id = ResourceId::simple("a");
        assert_eq!(ledger.record_failure(id.clone()), Strike::Retry { failures: 1 });
        assert_eq!(ledger.record_failure(id.clone()), Strike::Retry { failures: 2 });
        assert_eq!(ledger.record_failure(id.clone()), Strike::Exhausted { failures: 3 });
        assert_eq!(ledger.failures(&id), 3);
    }

    #[test]
    fn single_failure_budget_exhausts_immediately() {
        let mut ledger = FailureLedger::new(1);
        assert_eq!(
            ledger.record_failure(ResourceId::simple("a")),
            Strike::Exhausted { failures: 1 }
        );
    }

    #[test]
    fn zero_budget_behaves_like_one() {
        let mut ledger = FailureLedger::new(0);
        assert_eq!(ledger.max_failures(), 1);
        assert!(matches!(
            ledger.record_failure(ResourceId::simple("a")),
            Strike::Exhausted { .. }
        ));
    }

    #[test]
    fn counts_are_per_identity_and_reset_on_success() {
        let mut ledger = FailureLedger::new(5);
        let a = ResourceId::composite([("id", "x"), ("projectId", "p1")]);
        let b = ResourceId::composite([("id", "x"), ("projectId", "p2")]);
        ledger.record_failure(a.clone());
        ledger.record_failure(a.clone());
        ledger.record_failure(b.clone());
        assert_eq!(ledger.failures(&a), 2);
        assert_eq!(ledger.failures(&b), 1);
        ledger.record_success(&a);
        assert_eq!(ledger.failures(&a), 0);
    }
}
