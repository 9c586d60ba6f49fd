//! Deadline-bounded confirmation polling.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{info, warn};

use crate::adapter::ResourceKindAdapter;
use crate::resource::{ManagedResource, Verb};
use crate::ui::PhaseProgress;

#[derive(Debug, Default)]
pub struct PollOutcome {
    pub confirmed: Vec<ManagedResource>,
    pub timed_out: Vec<ManagedResource>,
}

/// Polls each resource in turn until it reaches the state `verb` aims for.
///
/// One deadline covers the whole set. When it passes, polling stops at once
/// (an in-flight query is abandoned) and whatever is left is timed out.
/// Query errors are logged and treated as "not yet".
pub async fn await_target_state(
    adapter: &dyn ResourceKindAdapter,
    verb: Verb,
    resources: Vec<ManagedResource>,
    grace_period: Duration,
    poll_interval: Duration,
    progress: &PhaseProgress,
) -> PollOutcome {
    let kind = adapter.kind();
    let deadline = Instant::now() + grace_period;
    let mut pending: VecDeque<ManagedResource> = resources.into();
    let mut outcome = PollOutcome::default();

    if !pending.is_empty() {
        info!(
            kind = %kind,
            pending = pending.len(),
            grace_secs = grace_period.as_secs(),
            "Waiting for resources to {verb}"
        );
    }

    while !pending.is_empty() && Instant::now() < deadline {
        let Some(resource) = pending.pop_front() else {
            break;
        };
        match timeout_at(deadline, adapter.reached(verb, &resource.id)).await {
            Err(_) => {
                pending.push_front(resource);
                break;
            }
            Ok(Ok(true)) => {
                info!(kind = %kind, resource = %resource.name, "Confirmed {verb}");
                progress.succeeded();
                outcome.confirmed.push(resource);
            }
            Ok(Ok(false)) => pending.push_back(resource),
            Ok(Err(e)) => {
                warn!(kind = %kind, resource = %resource.name, error = %e, "Error polling state");
                pending.push_back(resource);
            }
        }

        if !pending.is_empty() {
            sleep_until((Instant::now() + poll_interval).min(deadline)).await;
        }
    }

    if !pending.is_empty() {
        warn!(kind = %kind, timed_out = pending.len(), "Grace period elapsed");
    }
    outcome.timed_out = pending.into();
    outcome
}
