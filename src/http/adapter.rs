//! Resource kinds described declaratively in the config file.
//!
//! A [`KindConfig`] names the listing endpoint, where the identity, name,
//! owner and state live inside each listed item, and which requests stop and
//! start a resource. Path templates use `{scope}` plus the id component names.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{ListTarget, Listing, ResourceKindAdapter, Scope};
use crate::config::{ActionConfig, KindConfig};
use crate::error::{AdapterError, MaintenanceError};
use crate::resource::{IdPart, ManagedResource, ResourceId, ResourceKind};

use super::client::PlatformClient;

/// Pointer value that captures the scope id instead of reading the item.
const SCOPE_POINTER: &str = "$scope";

pub struct HttpKindAdapter {
    kind: ResourceKind,
    config: KindConfig,
    stop_method: Method,
    start_method: Option<Method>,
    client: Arc<PlatformClient>,
}

impl HttpKindAdapter {
    pub fn new(config: KindConfig, client: Arc<PlatformClient>) -> Result<Self, MaintenanceError> {
        let stop_method = parse_method(&config.label, &config.stop)?;
        let start_method = config
            .start
            .as_ref()
            .map(|action| parse_method(&config.label, action))
            .transpose()?;

        check_template(&config, &config.list_path, &["scope"])?;
        let id_names: Vec<&str> = config.id.keys().map(String::as_str).chain(["id"]).collect();
        check_template(&config, &config.status_path, &id_names)?;
        check_template(&config, &config.stop.path, &id_names)?;
        if let Some(start) = &config.start {
            check_template(&config, &start.path, &id_names)?;
        }

        Ok(Self {
            kind: ResourceKind::new(config.label.clone()),
            config,
            stop_method,
            start_method,
            client,
        })
    }

    fn parse_item(&self, item: &Value, scope: Option<&Scope>) -> Result<ManagedResource, String> {
        let mut parts = BTreeMap::new();
        for (name, pointer) in &self.config.id {
            let part = if pointer == SCOPE_POINTER {
                let scope = scope.ok_or_else(|| format!("'{name}' needs a scope"))?;
                IdPart::Text(scope.id.clone())
            } else {
                item.pointer(pointer)
                    .and_then(id_part)
                    .ok_or_else(|| format!("missing id field {pointer}"))?
            };
            parts.insert(name.clone(), part);
        }
        let id = if parts.len() == 1 {
            let (_, part) = parts.into_iter().next().ok_or("empty id")?;
            ResourceId::Simple(part.to_string())
        } else {
            ResourceId::Composite(parts)
        };

        let name = item
            .pointer(&self.config.name_pointer)
            .map(stringify)
            .unwrap_or_default();
        let owner = item
            .pointer(&self.config.owner_pointer)
            .map(stringify)
            .or_else(|| scope.map(|s| s.owner.clone()))
            .unwrap_or_default();
        Ok(ManagedResource::new(id, name, owner))
    }

    fn is_active(&self, item: &Value) -> bool {
        let state = item.pointer(&self.config.state_pointer).map(stringify);
        match state {
            Some(state) if !self.config.active_states.is_empty() => {
                self.config.active_states.contains(&state)
            }
            Some(state) => !self.config.stopped_states.contains(&state),
            None => self.config.active_states.is_empty(),
        }
    }

    /// Value of a named id component. A simple id answers to both `id` and,
    /// when the kind has a single component, that component's name.
    fn component(&self, id: &ResourceId, name: &str) -> Option<String> {
        if let ResourceId::Simple(s) = id
            && self.config.id.len() == 1
            && self.config.id.contains_key(name)
        {
            return Some(s.clone());
        }
        id.component(name).map(|part| part.to_string())
    }

    fn render(&self, template: &str, scope: Option<&str>, id: Option<&ResourceId>) -> Result<String, String> {
        render(template, |name| match name {
            "scope" => scope.map(str::to_string),
            _ => id.and_then(|id| self.component(id, name)),
        })
    }

    /// Every item of a listing, following pages when paging is configured.
    async fn fetch_items(&self, path: &str) -> Result<Vec<Value>, AdapterError> {
        let Some(paging) = &self.config.paging else {
            let response = self.get(path).await?;
            return self.items_of(path, response);
        };

        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        for page in paging.first_page..paging.first_page.saturating_add(paging.max_pages) {
            let url = format!(
                "{path}{separator}{}={page}&{}={}",
                paging.page_param, paging.size_param, paging.page_size
            );
            let response = self.get(&url).await?;
            let total = paging
                .total_pointer
                .as_deref()
                .and_then(|pointer| response.pointer(pointer))
                .and_then(Value::as_u64);
            let batch = self.items_of(&url, response)?;
            debug!(kind = %self.kind, page, count = batch.len(), "Fetched page");
            if batch.is_empty() {
                return Ok(items);
            }
            items.extend(batch);
            if let Some(total) = total
                && items.len() as u64 >= total
            {
                return Ok(items);
            }
        }
        Err(AdapterError::fetch(format!(
            "{path}: still paging after {} pages",
            paging.max_pages
        )))
    }

    async fn get(&self, path: &str) -> Result<Value, AdapterError> {
        self.client
            .get_json(path)
            .await
            .map_err(|e| AdapterError::fetch(e.to_string()))
    }

    fn items_of(&self, path: &str, mut response: Value) -> Result<Vec<Value>, AdapterError> {
        let items = match &self.config.items_pointer {
            Some(pointer) => response.pointer_mut(pointer).map(Value::take),
            None => Some(response),
        };
        match items {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(AdapterError::fetch(format!("{path}: response is not a list"))),
        }
    }

    async fn current_state(&self, id: &ResourceId) -> Result<String, AdapterError> {
        let path = self
            .render(&self.config.status_path, None, Some(id))
            .map_err(AdapterError::fetch)?;
        let status = self
            .client
            .get_json(&path)
            .await
            .map_err(|e| AdapterError::fetch(e.to_string()))?;
        status
            .pointer(&self.config.state_pointer)
            .map(stringify)
            .ok_or_else(|| AdapterError::fetch(format!("{path}: no state at {}", self.config.state_pointer)))
    }

    async fn act(&self, action: &ActionConfig, method: &Method, id: &ResourceId) -> Result<(), AdapterError> {
        let path = self
            .render(&action.path, None, Some(id))
            .map_err(|e| AdapterError::action(id, e))?;

        let body = match &action.merge {
            Some(fields) => {
                let status_path = self
                    .render(&self.config.status_path, None, Some(id))
                    .map_err(|e| AdapterError::action(id, e))?;
                let mut current = self
                    .client
                    .get_json(&status_path)
                    .await
                    .map_err(|e| AdapterError::action(id, e.to_string()))?;
                overlay(&mut current, fields);
                Some(current)
            }
            None => None,
        };

        self.client
            .send_json(method.clone(), &path, body.as_ref())
            .await
            .map_err(|e| AdapterError::action(id, e.to_string()))?;
        debug!(kind = %self.kind, %id, %method, %path, "Action accepted");
        Ok(())
    }
}

#[async_trait]
impl ResourceKindAdapter for HttpKindAdapter {
    fn kind(&self) -> ResourceKind {
        self.kind.clone()
    }

    fn listing(&self) -> Listing {
        if self.config.list_path.contains("{scope}") {
            Listing::PerScope
        } else {
            Listing::Global
        }
    }

    async fn list_active(&self, target: ListTarget<'_>) -> Result<Vec<ManagedResource>, AdapterError> {
        let scope = match target {
            ListTarget::Scope(scope) => Some(scope),
            ListTarget::Global => None,
        };
        let path = self
            .render(&self.config.list_path, scope.map(|s| s.id.as_str()), None)
            .map_err(AdapterError::fetch)?;
        let items = self.fetch_items(&path).await?;

        let mut resources = Vec::new();
        for item in items.iter().filter(|item| self.is_active(item)) {
            match self.parse_item(item, scope) {
                Ok(resource) => resources.push(resource),
                Err(reason) => warn!(kind = %self.kind, %target, %reason, "Skipping unreadable item"),
            }
        }
        Ok(resources)
    }

    async fn request_stop(&self, id: &ResourceId) -> Result<(), AdapterError> {
        self.act(&self.config.stop, &self.stop_method, id).await
    }

    async fn request_start(&self, id: &ResourceId) -> Result<(), AdapterError> {
        match (&self.config.start, &self.start_method) {
            (Some(action), Some(method)) if self.config.restartable => self.act(action, method, id).await,
            _ => Err(AdapterError::action(
                id,
                format!("{} does not support start", self.kind),
            )),
        }
    }

    async fn is_stopped(&self, id: &ResourceId) -> Result<bool, AdapterError> {
        let state = self.current_state(id).await?;
        Ok(if self.config.stopped_states.is_empty() {
            !self.config.running_states.contains(&state)
        } else {
            self.config.stopped_states.contains(&state)
        })
    }

    async fn is_running(&self, id: &ResourceId) -> Result<bool, AdapterError> {
        let state = self.current_state(id).await?;
        Ok(if self.config.running_states.is_empty() {
            !self.config.stopped_states.contains(&state)
        } else {
            self.config.running_states.contains(&state)
        })
    }

    fn supports_restart(&self) -> bool {
        self.config.restartable
    }

    fn accepts_id(&self, id: &ResourceId) -> bool {
        match id {
            ResourceId::Simple(_) => self.config.id.len() == 1,
            ResourceId::Composite(parts) => {
                self.config.id.len() > 1 && parts.keys().eq(self.config.id.keys())
            }
        }
    }

    fn ledger_key(&self, id: &ResourceId) -> ResourceId {
        match &self.config.ledger_key {
            Some(name) => id.project(name),
            None => id.clone(),
        }
    }
}

fn parse_method(label: &str, action: &ActionConfig) -> Result<Method, MaintenanceError> {
    Method::from_bytes(action.method.to_uppercase().as_bytes()).map_err(|_| {
        MaintenanceError::Config(format!("kind '{label}': invalid HTTP method '{}'", action.method))
    })
}

fn check_template(config: &KindConfig, template: &str, allowed: &[&str]) -> Result<(), MaintenanceError> {
    render(template, |name| allowed.iter().any(|a| *a == name).then(String::new))
        .map(|_| ())
        .map_err(|e| MaintenanceError::Config(format!("kind '{}': {e} in '{template}'", config.label)))
}

/// Substitutes `{name}` placeholders; an unresolvable name is an error.
fn render(template: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| "unclosed placeholder".to_string())?;
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| format!("unknown placeholder {{{name}}}"))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn id_part(value: &Value) -> Option<IdPart> {
    match value {
        Value::String(s) => Some(IdPart::Text(s.clone())),
        Value::Bool(b) => Some(IdPart::Flag(*b)),
        Value::Number(n) => n.as_i64().map(IdPart::Number),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn overlay(target: &mut Value, fields: &Value) {
    match (target.as_object_mut(), fields.as_object()) {
        (Some(target), Some(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        _ => *target = fields.clone(),
    }
}
