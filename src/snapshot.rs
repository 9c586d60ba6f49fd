//! Resources-per-kind captured at the start of a maintenance window.
//!
//! The restore pass works from this file so it only relaunches what was
//! running before, not anything started by others in the meantime. Files are
//! pretty-printed JSON keyed by kind label and are never overwritten.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::{Listing, ResourceKindAdapter, ScopeProvider};
use crate::enumerator::Enumerator;
use crate::error::MaintenanceError;
use crate::resource::{ManagedResource, ResourceKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    kinds: BTreeMap<ResourceKind, Vec<ManagedResource>>,
}

impl Snapshot {
    pub fn insert(&mut self, kind: ResourceKind, resources: Vec<ManagedResource>) {
        self.kinds.insert(kind, resources);
    }

    pub fn get(&self, kind: &ResourceKind) -> Option<&[ManagedResource]> {
        self.kinds.get(kind).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, &Vec<ManagedResource>)> {
        self.kinds.iter()
    }

    pub fn total(&self) -> usize {
        self.kinds.values().map(Vec::len).sum()
    }

    /// Enumerates every adapter's kind once.
    ///
    /// Scopes are fetched first, and only if some kind lists per scope; a
    /// failure to fetch them aborts the capture before any listing call.
    pub async fn capture(
        adapters: &[&dyn ResourceKindAdapter],
        scopes: &dyn ScopeProvider,
        enumerator: &Enumerator,
    ) -> Result<Snapshot, MaintenanceError> {
        let scopes = if adapters.iter().any(|a| a.listing() == Listing::PerScope) {
            scopes.scopes().await?
        } else {
            Vec::new()
        };
        info!(scopes = scopes.len(), kinds = adapters.len(), "Capturing snapshot");

        let mut snapshot = Snapshot::default();
        for adapter in adapters {
            let found = enumerator.enumerate(*adapter, &scopes).await;
            if !found.failed_targets.is_empty() {
                warn!(
                    kind = %adapter.kind(),
                    failed = ?found.failed_targets,
                    "Snapshot is incomplete for this kind"
                );
            }
            snapshot.insert(adapter.kind(), found.resources);
        }
        Ok(snapshot)
    }

    /// Writes the snapshot to a new file; an existing file is left untouched.
    pub fn persist(&self, path: &Path) -> Result<(), MaintenanceError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => MaintenanceError::AlreadyExists(path.to_path_buf()),
                _ => MaintenanceError::Io(e),
            })?;
        let json = serde_json::to_string_pretty(self)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        info!(path = %path.display(), total = self.total(), "Snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Snapshot, MaintenanceError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|source| MaintenanceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
