use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::FailedResource;
use crate::error::MaintenanceError;
use crate::resource::{ManagedResource, ResourceKind, Verb};

/// Identifier of one transition run: `kind-verb-timestamp`.
pub fn run_id(kind: &ResourceKind, verb: Verb, at: DateTime<Utc>) -> String {
    format!("{}-{verb}-{}", kind.slug(), at.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// On-disk record of the resources an operator must reconcile by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub run_id: String,
    pub kind: ResourceKind,
    pub verb: Verb,
    pub created_at: DateTime<Utc>,
    pub failed: Vec<FailedResource>,
    pub timeout: Vec<ManagedResource>,
}

impl FailureReport {
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty() && self.timeout.is_empty()
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-failed.json", self.run_id))
    }

    /// Writes (or rewrites) the report for this run, returning its path.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, MaintenanceError> {
        std::fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, MaintenanceError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|source| MaintenanceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Summary of one completed transition run.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    pub run_id: String,
    pub kind: ResourceKind,
    pub verb: Verb,
    pub requested: usize,
    pub confirmed: Vec<ManagedResource>,
    pub failed: Vec<FailedResource>,
    pub timed_out: Vec<ManagedResource>,
    pub report_path: Option<PathBuf>,
    /// Set when the failure report could not be written; its content was logged instead.
    pub report_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl TransitionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}
