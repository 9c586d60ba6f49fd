//! Configuration loaded from `maintctl.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! `MAINTCTL_API_KEY` and `MAINTCTL_BASE_URL` take precedence over the file;
//! CLI flags take precedence over both (see [`crate::cli::Cli::apply`]).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::EngineConfig;
use crate::error::MaintenanceError;

pub const DEFAULT_CONFIG_PATH: &str = "maintctl.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Platform root URL, e.g. `https://platform.example.com`.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    /// Header carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Where failure reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub enumeration: EnumerationSettings,

    #[serde(default)]
    pub scopes: Option<ScopesConfig>,

    #[serde(default)]
    pub kinds: Vec<KindConfig>,
}

/// Limits for the transition engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_interval_secs")]
    pub batch_interval_secs: u64,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Limits for read-side fan-out.
#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// GET attempts before a listing or poll counts as failed.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_fetch_base_delay_ms")]
    pub fetch_base_delay_ms: u64,
}

/// Endpoint listing the scopes (projects) resources live under.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopesConfig {
    pub list_path: String,
    #[serde(default)]
    pub items_pointer: Option<String>,
    #[serde(default = "default_id_pointer")]
    pub id_pointer: String,
    #[serde(default = "default_name_pointer")]
    pub name_pointer: String,
    #[serde(default = "default_owner_pointer")]
    pub owner_pointer: String,
}

/// Declarative description of one resource kind served over HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    pub label: String,

    #[serde(default)]
    pub restartable: bool,

    /// Listing endpoint; a `{scope}` placeholder makes the kind list per scope.
    pub list_path: String,

    /// JSON pointer to the array inside the list response.
    #[serde(default)]
    pub items_pointer: Option<String>,

    /// Query parameters for paged listings; absent means one request.
    #[serde(default)]
    pub paging: Option<PagingConfig>,

    /// Id component name to JSON pointer within a list item.
    /// `$scope` captures the scope id instead.
    pub id: BTreeMap<String, String>,

    /// Component used for failure counting instead of the full id.
    #[serde(default)]
    pub ledger_key: Option<String>,

    #[serde(default = "default_name_pointer")]
    pub name_pointer: String,

    #[serde(default = "default_owner_pointer")]
    pub owner_pointer: String,

    /// Pointer to the state field, in list items and status responses.
    #[serde(default = "default_state_pointer")]
    pub state_pointer: String,

    /// States counted as active when listing. When empty, anything not in
    /// `stopped_states` is active.
    #[serde(default)]
    pub active_states: Vec<String>,

    pub status_path: String,

    #[serde(default)]
    pub stopped_states: Vec<String>,

    #[serde(default)]
    pub running_states: Vec<String>,

    pub stop: ActionConfig,

    #[serde(default)]
    pub start: Option<ActionConfig>,
}

/// Page-by-page listing. Pages are numbered from `first_page` and requested
/// until one comes back empty or, with `total_pointer`, until the reported
/// total has been collected.
#[derive(Debug, Clone, Deserialize)]
pub struct PagingConfig {
    pub page_param: String,
    pub size_param: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub first_page: u64,
    /// Pointer to the total item count in each page response.
    #[serde(default)]
    pub total_pointer: Option<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
}

/// A state-changing request.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    /// Fields overlaid on the current status document, which is then sent
    /// as the request body.
    #[serde(default)]
    pub merge: Option<serde_json::Value>,
}

fn default_api_key_header() -> String {
    "X-Api-Key".to_string()
}

fn default_verify_tls() -> bool {
    true
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_interval_secs() -> u64 {
    5
}

fn default_max_failures() -> u32 {
    5
}

fn default_grace_period_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_concurrency() -> usize {
    10
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_base_delay_ms() -> u64 {
    500
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> u64 {
    10_000
}

fn default_id_pointer() -> String {
    "/id".to_string()
}

fn default_name_pointer() -> String {
    "/name".to_string()
}

fn default_owner_pointer() -> String {
    "/owner".to_string()
}

fn default_state_pointer() -> String {
    "/status".to_string()
}

fn default_method() -> String {
    "POST".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_interval_secs: default_batch_interval_secs(),
            max_failures: default_max_failures(),
            grace_period_secs: default_grace_period_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size,
            batch_interval: Duration::from_secs(self.batch_interval_secs),
            max_failures: self.max_failures,
            grace_period: Duration::from_secs(self.grace_period_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

impl Default for EnumerationSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_retries: default_fetch_retries(),
            fetch_base_delay_ms: default_fetch_base_delay_ms(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            api_key_header: default_api_key_header(),
            verify_tls: default_verify_tls(),
            report_dir: default_report_dir(),
            engine: EngineSettings::default(),
            enumeration: EnumerationSettings::default(),
            scopes: None,
            kinds: Vec::new(),
        }
    }
}

impl MaintenanceConfig {
    /// Loads `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, MaintenanceError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, MaintenanceError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<MaintenanceConfig>(&contents)?
        } else {
            Self::default()
        };

        if let Some(key) = env("MAINTCTL_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }
        if let Some(url) = env("MAINTCTL_BASE_URL")
            && !url.is_empty()
        {
            config.base_url = url;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), MaintenanceError> {
        if self.engine.batch_size == 0 {
            return Err(MaintenanceError::Config("batch_size must be at least 1".into()));
        }
        if self.engine.max_failures == 0 {
            return Err(MaintenanceError::Config("max_failures must be at least 1".into()));
        }
        if self.enumeration.concurrency == 0 {
            return Err(MaintenanceError::Config("concurrency must be at least 1".into()));
        }

        let mut labels = HashSet::new();
        for kind in &self.kinds {
            if !labels.insert(kind.label.as_str()) {
                return Err(MaintenanceError::Config(format!(
                    "kind '{}' is defined more than once",
                    kind.label
                )));
            }
            if kind.id.is_empty() {
                return Err(MaintenanceError::Config(format!(
                    "kind '{}' has no id fields",
                    kind.label
                )));
            }
            if let Some(paging) = &kind.paging
                && (paging.page_size == 0 || paging.max_pages == 0)
            {
                return Err(MaintenanceError::Config(format!(
                    "kind '{}': page_size and max_pages must be at least 1",
                    kind.label
                )));
            }
            if kind.restartable && kind.start.is_none() {
                return Err(MaintenanceError::Config(format!(
                    "kind '{}' is restartable but has no start action",
                    kind.label
                )));
            }
        }
        Ok(())
    }
}
