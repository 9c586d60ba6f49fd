//! Rate-limited batched invocation of stop/start requests.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use super::ledger::{FailureLedger, Strike};
use crate::adapter::ResourceKindAdapter;
use crate::resource::{ManagedResource, Verb};
use crate::ui::PhaseProgress;

/// A resource whose request never succeeded, with the last error seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedResource {
    #[serde(flatten)]
    pub resource: ManagedResource,
    pub error: String,
}

/// Partition of the input after the invocation phase.
#[derive(Debug, Default)]
pub struct BatchCallResult {
    pub success: Vec<ManagedResource>,
    pub failed: Vec<FailedResource>,
}

/// Batch shape and retry budget for the invocation phase.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub max_failures: u32,
}

/// Issues `verb` on every resource, `batch_size` at a time.
///
/// A failed resource goes back to the front of the queue so it is retried in
/// the very next batch, until its ledger count reaches `max_failures`.
pub async fn invoke_batched(
    adapter: &dyn ResourceKindAdapter,
    verb: Verb,
    resources: Vec<ManagedResource>,
    policy: &BatchPolicy,
    progress: &PhaseProgress,
) -> BatchCallResult {
    let kind = adapter.kind();
    let batch_size = policy.batch_size.max(1);
    let mut ledger = FailureLedger::new(policy.max_failures);
    let mut queue: VecDeque<ManagedResource> = resources.into();
    let mut result = BatchCallResult::default();

    while !queue.is_empty() {
        let take = batch_size.min(queue.len());
        let batch: Vec<ManagedResource> = queue.drain(..take).collect();
        let mut retry = Vec::new();

        for resource in batch {
            let key = adapter.ledger_key(&resource.id);
            match adapter.request(verb, &resource.id).await {
                Ok(()) => {
                    ledger.record_success(&key);
                    info!(kind = %kind, resource = %resource.name, id = %resource.id, "Successful {verb}");
                    progress.succeeded();
                    result.success.push(resource);
                }
                Err(e) => match ledger.record_failure(key) {
                    Strike::Retry { failures } => {
                        warn!(
                            kind = %kind,
                            resource = %resource.name,
                            attempt = failures,
                            error = %e,
                            "Failed to {verb} (retrying)"
                        );
                        progress.retry(failures, ledger.max_failures(), &resource.name, &e.to_string());
                        retry.push(resource);
                    }
                    Strike::Exhausted { failures } => {
                        warn!(
                            kind = %kind,
                            resource = %resource.name,
                            attempts = failures,
                            error = %e,
                            "Failed to {verb}, giving up"
                        );
                        progress.failed(&resource.name, &e.to_string());
                        result.failed.push(FailedResource {
                            resource,
                            error: e.to_string(),
                        });
                    }
                },
            }
        }

        // Retries jump the queue, keeping their original relative order.
        for resource in retry.into_iter().rev() {
            queue.push_front(resource);
        }

        if !queue.is_empty() {
            info!(kind = %kind, remaining = queue.len(), "Batch complete");
            sleep(policy.batch_interval).await;
        }
    }

    result
}
