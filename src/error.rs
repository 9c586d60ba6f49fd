use std::path::PathBuf;

use thiserror::Error;

use crate::resource::ResourceId;

/// Errors fatal to the operation that raised them: preconditions and infrastructure.
#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unable to fetch scopes: {0}")]
    NoScopes(String),

    #[error("No adapter configured for resource kind '{0}'")]
    UnknownKind(String),

    #[error("Snapshot id '{id}' does not match the identity of kind '{kind}'")]
    IdentityMismatch { kind: String, id: String },

    #[error("Refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Malformed snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors raised across the adapter boundary.
///
/// Neither variant is fatal to a run: fetch errors mean "no data this round",
/// action errors are counted against the per-resource failure budget.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A listing or state query failed.
    #[error("fetch failed: {0}")]
    TransientFetch(String),

    /// A stop/start request was rejected or could not be delivered.
    #[error("action on {id} failed: {message}")]
    RemoteAction { id: ResourceId, message: String },
}

impl AdapterError {
    pub fn fetch(message: impl Into<String>) -> Self {
        AdapterError::TransientFetch(message.into())
    }

    pub fn action(id: &ResourceId, message: impl Into<String>) -> Self {
        AdapterError::RemoteAction {
            id: id.clone(),
            message: message.into(),
        }
    }
}
