//! Capability contracts the maintenance core consumes.
//!
//! The engine and enumerator only ever talk to a resource kind through
//! [`ResourceKindAdapter`]; they never know what a kind is. Scope discovery
//! and operator confirmation are injected the same way.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, MaintenanceError};
use crate::resource::{ManagedResource, ResourceId, ResourceKind, Verb};

/// An organizational boundary (e.g. a project) resources are listed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    pub name: String,
    pub owner: String,
}

impl Scope {
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// How a kind's active resources are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// One listing call per scope.
    PerScope,
    /// A single platform-wide listing call.
    Global,
}

/// What a single listing call covers.
#[derive(Debug, Clone, Copy)]
pub enum ListTarget<'a> {
    Global,
    Scope(&'a Scope),
}

impl fmt::Display for ListTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListTarget::Global => write!(f, "global"),
            ListTarget::Scope(scope) => write!(f, "{}/{}", scope.owner, scope.name),
        }
    }
}

/// Operations every resource-kind plugin implements.
///
/// `request_stop` and `request_start` must be safe to re-issue: the engine
/// calls them again on the same id after a failure.
#[async_trait]
pub trait ResourceKindAdapter: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn listing(&self) -> Listing {
        Listing::PerScope
    }

    async fn list_active(
        &self,
        target: ListTarget<'_>,
    ) -> Result<Vec<ManagedResource>, AdapterError>;

    async fn request_stop(&self, id: &ResourceId) -> Result<(), AdapterError>;

    async fn request_start(&self, id: &ResourceId) -> Result<(), AdapterError>;

    async fn is_stopped(&self, id: &ResourceId) -> Result<bool, AdapterError>;

    async fn is_running(&self, id: &ResourceId) -> Result<bool, AdapterError>;

    fn supports_restart(&self) -> bool;

    /// Whether `id` has the identity shape this kind uses. Checked on
    /// snapshot contents before anything is issued.
    fn accepts_id(&self, _id: &ResourceId) -> bool {
        true
    }

    /// Key used for failure counting. Defaults to the full identity.
    fn ledger_key(&self, id: &ResourceId) -> ResourceId {
        id.clone()
    }

    /// Issues the request matching `verb`.
    async fn request(&self, verb: Verb, id: &ResourceId) -> Result<(), AdapterError> {
        match verb {
            Verb::Stop => self.request_stop(id).await,
            Verb::Start => self.request_start(id).await,
        }
    }

    /// Whether `id` has reached the state `verb` aims for.
    async fn reached(&self, verb: Verb, id: &ResourceId) -> Result<bool, AdapterError> {
        match verb {
            Verb::Stop => self.is_stopped(id).await,
            Verb::Start => self.is_running(id).await,
        }
    }
}

/// Supplies the scopes the enumerator fans out over.
#[async_trait]
pub trait ScopeProvider: Send + Sync {
    async fn scopes(&self) -> Result<Vec<Scope>, MaintenanceError>;
}

/// A fixed list of scopes.
#[async_trait]
impl ScopeProvider for Vec<Scope> {
    async fn scopes(&self) -> Result<Vec<Scope>, MaintenanceError> {
        Ok(self.clone())
    }
}

/// Yes/no gate consulted before any transition is issued.
pub trait ConfirmationSource: Send + Sync {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool>;
}

/// Answers yes to every prompt (`--yes`).
pub struct AssumeYes;

impl ConfirmationSource for AssumeYes {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        tracing::info!(prompt, "Confirmation assumed");
        Ok(true)
    }
}

/// Parses an operator answer; only "y" and "yes" (any case) are affirmative.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
