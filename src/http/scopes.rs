use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::adapter::{Scope, ScopeProvider};
use crate::config::ScopesConfig;
use crate::error::MaintenanceError;

use super::client::PlatformClient;

/// Lists scopes from the platform's project endpoint.
pub struct HttpScopeProvider {
    config: ScopesConfig,
    client: Arc<PlatformClient>,
}

impl HttpScopeProvider {
    pub fn new(config: ScopesConfig, client: Arc<PlatformClient>) -> Self {
        Self { config, client }
    }

    fn parse(&self, item: &Value) -> Option<Scope> {
        let text = |pointer: &str| {
            item.pointer(pointer).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        };
        Some(Scope::new(
            text(&self.config.id_pointer)?,
            text(&self.config.name_pointer).unwrap_or_default(),
            text(&self.config.owner_pointer).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ScopeProvider for HttpScopeProvider {
    async fn scopes(&self) -> Result<Vec<Scope>, MaintenanceError> {
        let response = self
            .client
            .get_json(&self.config.list_path)
            .await
            .map_err(|e| MaintenanceError::NoScopes(e.to_string()))?;

        let items = match &self.config.items_pointer {
            Some(pointer) => response.pointer(pointer),
            None => Some(&response),
        }
        .and_then(Value::as_array)
        .ok_or_else(|| {
            MaintenanceError::NoScopes(format!("{}: response is not a list", self.config.list_path))
        })?;

        let mut scopes = Vec::with_capacity(items.len());
        for item in items {
            match self.parse(item) {
                Some(scope) => scopes.push(scope),
                None => warn!(item = %item, "Skipping scope without an id"),
            }
        }
        info!(count = scopes.len(), "Fetched scopes");
        Ok(scopes)
    }
}

/// Stand-in used when no `[scopes]` section is configured: any per-scope
/// kind then fails the capture up front.
pub struct NoScopeSource;

#[async_trait]
impl ScopeProvider for NoScopeSource {
    async fn scopes(&self) -> Result<Vec<Scope>, MaintenanceError> {
        Err(MaintenanceError::NoScopes(
            "a kind lists per scope but no [scopes] endpoint is configured".into(),
        ))
    }
}
