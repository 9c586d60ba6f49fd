//! In-memory adapter and canned confirmation source shared by the test modules.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{ConfirmationSource, ListTarget, Listing, ResourceKindAdapter};
use crate::error::AdapterError;
use crate::http::{PlatformClient, RetryConfig};
use crate::resource::{ManagedResource, ResourceId, ResourceKind};

/// Builds `n` resources with simple ids `"{prefix}-{i}"`.
pub fn resources(prefix: &str, n: usize) -> Vec<ManagedResource> {
    (0..n)
        .map(|i| {
            ManagedResource::new(
                ResourceId::simple(format!("{prefix}-{i}")),
                format!("{prefix} {i}"),
                "owner",
            )
        })
        .collect()
}

/// Client pointed at a mock server, with millisecond backoff.
pub fn platform_client(base_url: String) -> std::sync::Arc<PlatformClient> {
    let retry = RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
    };
    std::sync::Arc::new(
        PlatformClient::new(base_url, "secret".into(), "X-Api-Key".into(), true, retry)
            .expect("valid client"),
    )
}

/// Scriptable adapter with a shared view of what was called.
pub struct FakeAdapter {
    kind: ResourceKind,
    listing: Listing,
    restartable: bool,
    ledger_component: Option<String>,
    by_scope: HashMap<String, Vec<ManagedResource>>,
    global: Vec<ManagedResource>,
    failing_scopes: HashSet<String>,
    list_delay: Duration,
    /// Remaining request failures per id; `u32::MAX` fails forever.
    failures: Mutex<HashMap<ResourceId, u32>>,
    /// Ids whose state predicate never turns true.
    stuck: HashSet<ResourceId>,
    /// Number of poll errors to raise before answering truthfully.
    poll_errors: Mutex<u32>,
    pub attempts: Mutex<HashMap<ResourceId, u32>>,
    pub stopped: Mutex<HashSet<ResourceId>>,
    pub order: Mutex<VecDeque<ResourceId>>,
    pub polls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// Component names a composite id must carry; `None` accepts any id.
    id_shape: Option<Vec<String>>,
    on_request: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FakeAdapter {
    pub fn new(label: &str) -> Self {
        Self {
            kind: ResourceKind::new(label),
            listing: Listing::PerScope,
            restartable: true,
            ledger_component: None,
            by_scope: HashMap::new(),
            global: Vec::new(),
            failing_scopes: HashSet::new(),
            list_delay: Duration::ZERO,
            failures: Mutex::new(HashMap::new()),
            stuck: HashSet::new(),
            poll_errors: Mutex::new(0),
            attempts: Mutex::new(HashMap::new()),
            stopped: Mutex::new(HashSet::new()),
            order: Mutex::new(VecDeque::new()),
            polls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            id_shape: None,
            on_request: None,
        }
    }

    pub fn global(mut self, items: Vec<ManagedResource>) -> Self {
        self.listing = Listing::Global;
        self.global = items;
        self
    }

    pub fn in_scope(mut self, scope_id: &str, items: Vec<ManagedResource>) -> Self {
        self.by_scope.insert(scope_id.to_string(), items);
        self
    }

    pub fn failing_scope(mut self, scope_id: &str) -> Self {
        self.failing_scopes.insert(scope_id.to_string());
        self
    }

    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn not_restartable(mut self) -> Self {
        self.restartable = false;
        self
    }

    pub fn ledger_component(mut self, name: &str) -> Self {
        self.ledger_component = Some(name.to_string());
        self
    }

    pub fn id_shape(mut self, components: &[&str]) -> Self {
        self.id_shape = Some(components.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Runs `hook` at the start of every stop/start request.
    pub fn on_request(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_request = Some(Box::new(hook));
        self
    }

    /// Fails the first `times` requests on `id`.
    pub fn fail(self, id: &ResourceId, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(id.clone(), times);
        self
    }

    pub fn fail_always(self, id: &ResourceId) -> Self {
        self.fail(id, u32::MAX)
    }

    pub fn stuck(mut self, id: &ResourceId) -> Self {
        self.stuck.insert(id.clone());
        self
    }

    pub fn poll_errors(self, n: u32) -> Self {
        *self.poll_errors.lock().unwrap() = n;
        self
    }

    pub fn attempts_for(&self, id: &ResourceId) -> u32 {
        self.attempts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.attempts.lock().unwrap().values().sum()
    }

    fn record(&self, id: &ResourceId) -> Result<(), AdapterError> {
        if let Some(hook) = &self.on_request {
            hook();
        }
        *self.attempts.lock().unwrap().entry(id.clone()).or_insert(0) += 1;
        self.order.lock().unwrap().push_back(id.clone());
        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(id)
            && *left > 0
        {
            if *left != u32::MAX {
                *left -= 1;
            }
            return Err(AdapterError::action(id, "injected failure"));
        }
        Ok(())
    }

    fn poll(&self) -> Result<(), AdapterError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut errors = self.poll_errors.lock().unwrap();
        if *errors > 0 {
            *errors -= 1;
            return Err(AdapterError::fetch("injected poll error"));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceKindAdapter for FakeAdapter {
    fn kind(&self) -> ResourceKind {
        self.kind.clone()
    }

    fn listing(&self) -> Listing {
        self.listing
    }

    async fn list_active(
        &self,
        target: ListTarget<'_>,
    ) -> Result<Vec<ManagedResource>, AdapterError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match target {
            ListTarget::Global => Ok(self.global.clone()),
            ListTarget::Scope(scope) if self.failing_scopes.contains(&scope.id) => {
                Err(AdapterError::fetch(format!("scope {} unavailable", scope.id)))
            }
            ListTarget::Scope(scope) => Ok(self.by_scope.get(&scope.id).cloned().unwrap_or_default()),
        }
    }

    async fn request_stop(&self, id: &ResourceId) -> Result<(), AdapterError> {
        self.record(id)?;
        self.stopped.lock().unwrap().insert(id.clone());
        Ok(())
    }

    async fn request_start(&self, id: &ResourceId) -> Result<(), AdapterError> {
        self.record(id)?;
        self.stopped.lock().unwrap().remove(id);
        Ok(())
    }

    async fn is_stopped(&self, id: &ResourceId) -> Result<bool, AdapterError> {
        self.poll()?;
        Ok(!self.stuck.contains(id) && self.stopped.lock().unwrap().contains(id))
    }

    async fn is_running(&self, id: &ResourceId) -> Result<bool, AdapterError> {
        self.poll()?;
        Ok(!self.stuck.contains(id) && !self.stopped.lock().unwrap().contains(id))
    }

    fn supports_restart(&self) -> bool {
        self.restartable
    }

    fn accepts_id(&self, id: &ResourceId) -> bool {
        match (&self.id_shape, id) {
            (None, _) => true,
            (Some(shape), ResourceId::Composite(parts)) => parts.keys().eq(shape.iter()),
            (Some(_), ResourceId::Simple(_)) => false,
        }
    }

    fn ledger_key(&self, id: &ResourceId) -> ResourceId {
        match &self.ledger_component {
            Some(name) => id.project(name),
            None => id.clone(),
        }
    }
}

/// Replays a fixed sequence of answers, then declines.
pub struct CannedAnswers {
    answers: Mutex<VecDeque<bool>>,
    pub prompts: Mutex<Vec<String>>,
}

impl CannedAnswers {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl ConfirmationSource for CannedAnswers {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }
}
