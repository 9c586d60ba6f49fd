//! Fans listing calls for one resource kind out across scopes.
//!
//! Calls run on a bounded pool (`buffer_unordered`) so a large tenant list
//! does not flood the remote API. A failing scope is logged and left out of
//! the result; it never fails the scan.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::adapter::{ListTarget, Listing, ResourceKindAdapter, Scope};
use crate::resource::ManagedResource;

/// Result of enumerating one kind.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Union of all successful listings, duplicates collapsed.
    pub resources: Vec<ManagedResource>,
    /// Targets whose listing failed, for the operator summary.
    pub failed_targets: Vec<String>,
}

pub struct Enumerator {
    concurrency: usize,
}

impl Enumerator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub async fn enumerate(
        &self,
        adapter: &dyn ResourceKindAdapter,
        scopes: &[Scope],
    ) -> Enumeration {
        let kind = adapter.kind();
        let targets: Vec<ListTarget<'_>> = match adapter.listing() {
            Listing::Global => vec![ListTarget::Global],
            Listing::PerScope => scopes.iter().map(ListTarget::Scope).collect(),
        };
        info!(
            kind = %kind,
            targets = targets.len(),
            concurrency = self.concurrency,
            "Scanning for active resources"
        );

        let results: Vec<_> = stream::iter(targets)
            .map(|target| async move { (target, adapter.list_active(target).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut out = Enumeration::default();
        for (target, result) in results {
            match result {
                Ok(items) => {
                    debug!(kind = %kind, target = %target, found = items.len(), "Listed");
                    for item in items {
                        if seen.insert(item.id.clone()) {
                            out.resources.push(item);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        kind = %kind,
                        target = %target,
                        error = %e,
                        "Listing failed, snapshot may not include all resources"
                    );
                    out.failed_targets.push(target.to_string());
                }
            }
        }

        info!(kind = %kind, active = out.resources.len(), "Scan complete");
        out
    }
}
