//! Identity and naming types for the resources a maintenance window controls.
//!
//! A [`ManagedResource`] is created during enumeration and never mutated; only
//! its remote-side state changes. Its [`ResourceId`] is either a bare string or
//! a small structured record, and serializes untagged so snapshot files stay
//! readable and structured ids round-trip exactly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One component of a structured identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdPart {
    Text(String),
    Flag(bool),
    Number(i64),
}

impl fmt::Display for IdPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPart::Text(s) => write!(f, "{s}"),
            IdPart::Flag(b) => write!(f, "{b}"),
            IdPart::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for IdPart {
    fn from(value: &str) -> Self {
        IdPart::Text(value.to_string())
    }
}

impl From<String> for IdPart {
    fn from(value: String) -> Self {
        IdPart::Text(value)
    }
}

impl From<bool> for IdPart {
    fn from(value: bool) -> Self {
        IdPart::Flag(value)
    }
}

impl From<i64> for IdPart {
    fn from(value: i64) -> Self {
        IdPart::Number(value)
    }
}

/// Opaque identity of a resource, as understood by the adapter of its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Simple(String),
    Composite(BTreeMap<String, IdPart>),
}

impl ResourceId {
    pub fn simple(id: impl Into<String>) -> Self {
        ResourceId::Simple(id.into())
    }

    pub fn composite<K, V>(parts: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<IdPart>,
    {
        ResourceId::Composite(
            parts
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Looks up a named component. A simple id only answers to `"id"`.
    pub fn component(&self, name: &str) -> Option<IdPart> {
        match self {
            ResourceId::Simple(s) if name == "id" => Some(IdPart::Text(s.clone())),
            ResourceId::Simple(_) => None,
            ResourceId::Composite(parts) => parts.get(name).cloned(),
        }
    }

    /// Narrows the identity to a single component, falling back to the full id
    /// when the component is absent.
    pub fn project(&self, name: &str) -> ResourceId {
        match self.component(name) {
            Some(part) => ResourceId::Simple(part.to_string()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Simple(s) => write!(f, "{s}"),
            ResourceId::Composite(parts) => {
                let mut first = true;
                for (k, v) in parts {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, "{k}={v}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

/// A single controllable unit of running work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedResource {
    pub id: ResourceId,
    pub name: String,
    pub owner: String,
}

impl ManagedResource {
    pub fn new(id: ResourceId, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// Category label routing resources to their adapter ("App", "Workspace", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(String);

impl ResourceKind {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    /// Lowercase, dash-separated form usable in file names.
    pub fn slug(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for c in self.0.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.ends_with('-') {
                out.push('-');
            }
        }
        out.trim_matches('-').to_string()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Stop,
    Start,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Stop => write!(f, "stop"),
            Verb::Start => write!(f, "start"),
        }
    }
}

/// The unit of work submitted to the transition engine.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub verb: Verb,
    pub kind: ResourceKind,
    pub resources: Vec<ManagedResource>,
}

impl TransitionRequest {
    pub fn new(verb: Verb, kind: ResourceKind, resources: Vec<ManagedResource>) -> Self {
        Self {
            verb,
            kind,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&ResourceId::simple("abc")).unwrap();
        assert_eq!(json, r#""abc""#);
    }

    #[test]
    fn composite_id_keeps_typed_components() {
        let id = ResourceId::composite([
            ("id", IdPart::from("v1")),
            ("modelId", IdPart::from("m1")),
            ("isActive", IdPart::from(true)),
        ]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"id":"v1","isActive":true,"modelId":"m1"}"#);
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn nested_objects_are_not_valid_ids() {
        let result: Result<ResourceId, _> = serde_json::from_str(r#"{"a":{"b":1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn project_narrows_to_component() {
        let id = ResourceId::composite([("id", "w1"), ("projectId", "p1")]);
        assert_eq!(id.project("id"), ResourceId::simple("w1"));
        assert_eq!(id.project("missing"), id);
        assert_eq!(ResourceId::simple("x").project("id"), ResourceId::simple("x"));
    }

    #[test]
    fn composite_display_is_stable() {
        let id = ResourceId::composite([("projectId", "p1"), ("key", "k9")]);
        assert_eq!(id.to_string(), "key=k9,projectId=p1");
    }

    #[test]
    fn kind_slug() {
        assert_eq!(ResourceKind::new("Model API Version").slug(), "model-api-version");
        assert_eq!(ResourceKind::new("Scheduled Job").slug(), "scheduled-job");
        assert_eq!(ResourceKind::new("App").slug(), "app");
    }

    #[test]
    fn verb_display() {
        assert_eq!(Verb::Stop.to_string(), "stop");
        assert_eq!(Verb::Start.to_string(), "start");
    }
}
