use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::adapter::{ResourceKindAdapter, ScopeProvider};
use crate::engine::{TransitionEngine, TransitionOutcome};
use crate::enumerator::Enumerator;
use crate::error::MaintenanceError;
use crate::resource::{ResourceKind, TransitionRequest, Verb};
use crate::snapshot::Snapshot;
use crate::ui;

/// Exit code when every requested resource was confirmed.
pub const EXIT_OK: i32 = 0;
/// Exit code for fatal errors (set by `main`).
pub const EXIT_FATAL: i32 = 1;
/// Exit code when at least one resource failed or timed out.
pub const EXIT_INCOMPLETE: i32 = 2;
/// Exit code when the operator declined a kind and nothing failed.
pub const EXIT_DECLINED: i32 = 3;

/// Per-kind outcomes of a stop or restore pass, in the order they ran.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(ResourceKind, TransitionOutcome)>,
}

/// Resource counts summed over every completed kind.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub confirmed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub declined: usize,
}

impl RunSummary {
    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for (_, outcome) in &self.outcomes {
            match outcome {
                TransitionOutcome::Completed(report) => {
                    totals.confirmed += report.confirmed.len();
                    totals.failed += report.failed.len();
                    totals.timed_out += report.timed_out.len();
                }
                TransitionOutcome::Declined => totals.declined += 1,
                TransitionOutcome::Skipped => {}
            }
        }
        totals
    }

    pub fn exit_code(&self) -> i32 {
        let totals = self.totals();
        if totals.failed + totals.timed_out > 0 {
            EXIT_INCOMPLETE
        } else if totals.declined > 0 {
            EXIT_DECLINED
        } else {
            EXIT_OK
        }
    }
}

/// Drives the maintenance window across every configured kind.
///
/// Kinds run one after another, in registry order; each is an isolated
/// engine run.
pub struct MaintenanceOrchestrator<'a> {
    adapters: Vec<Arc<dyn ResourceKindAdapter>>,
    kind_filter: Vec<String>,
    engine: TransitionEngine<'a>,
    enumerator: Enumerator,
    print: bool,
}

impl<'a> MaintenanceOrchestrator<'a> {
    pub fn new(
        adapters: Vec<Arc<dyn ResourceKindAdapter>>,
        engine: TransitionEngine<'a>,
        enumerator: Enumerator,
    ) -> Self {
        Self {
            adapters,
            kind_filter: Vec::new(),
            engine,
            enumerator,
            print: false,
        }
    }

    /// Restricts every pass to the given kind labels.
    pub fn with_kinds(mut self, labels: Vec<String>) -> Self {
        self.kind_filter = labels;
        self
    }

    /// Prints a colored line per kind as it completes.
    pub fn with_output(mut self, print: bool) -> Self {
        self.print = print;
        self
    }

    fn selected(&self) -> Result<Vec<&dyn ResourceKindAdapter>, MaintenanceError> {
        for label in &self.kind_filter {
            if !self.adapters.iter().any(|a| a.kind().label() == label) {
                return Err(MaintenanceError::UnknownKind(label.clone()));
            }
        }
        Ok(self
            .adapters
            .iter()
            .filter(|a| {
                self.kind_filter.is_empty() || self.kind_filter.iter().any(|l| l == a.kind().label())
            })
            .map(|a| &**a)
            .collect())
    }

    /// Captures every selected kind and writes the snapshot to `output`.
    pub async fn snapshot(&self, scopes: &dyn ScopeProvider, output: &Path) -> Result<Snapshot> {
        // Checked before any remote call so a long scan is never thrown away.
        if output.exists() {
            return Err(MaintenanceError::AlreadyExists(output.to_path_buf()).into());
        }
        let adapters = self.selected()?;
        let snapshot = Snapshot::capture(&adapters, scopes, &self.enumerator).await?;
        snapshot.persist(output)?;
        Ok(snapshot)
    }

    /// Drives every snapshotted resource to stopped.
    pub async fn stop(&self, snapshot: &Snapshot) -> Result<RunSummary> {
        self.transition(Verb::Stop, snapshot).await
    }

    /// Relaunches the snapshotted resources of every restartable kind.
    pub async fn restore(&self, snapshot: &Snapshot) -> Result<RunSummary> {
        self.transition(Verb::Start, snapshot).await
    }

    async fn transition(&self, verb: Verb, snapshot: &Snapshot) -> Result<RunSummary> {
        let adapters = self.selected()?;
        for (kind, resources) in snapshot.iter() {
            let wanted = self.kind_filter.is_empty() || self.kind_filter.iter().any(|l| l == kind.label());
            if !wanted {
                continue;
            }
            let Some(adapter) = adapters.iter().find(|a| a.kind() == *kind) else {
                return Err(MaintenanceError::UnknownKind(kind.label().to_string()).into());
            };
            if let Some(bad) = resources.iter().find(|r| !adapter.accepts_id(&r.id)) {
                return Err(MaintenanceError::IdentityMismatch {
                    kind: kind.label().to_string(),
                    id: bad.id.to_string(),
                }
                .into());
            }
        }

        let mut summary = RunSummary::default();
        for adapter in adapters {
            let kind = adapter.kind();
            let Some(resources) = snapshot.get(&kind) else {
                info!(kind = %kind, "Kind not in snapshot");
                continue;
            };
            if verb == Verb::Start && !adapter.supports_restart() {
                info!(kind = %kind, count = resources.len(), "Kind cannot be restarted, skipping");
                continue;
            }

            let request = TransitionRequest::new(verb, kind.clone(), resources.to_vec());
            let outcome = match self.engine.run(adapter, request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(kind = %kind, completed = summary.outcomes.len(), "Stopping before remaining kinds");
                    if self.print && !summary.outcomes.is_empty() {
                        ui::print_totals(&summary);
                    }
                    return Err(e.context(format!("{verb} {kind}")));
                }
            };
            if self.print {
                ui::print_outcome(&kind, &outcome);
            }
            summary.outcomes.push((kind, outcome));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::adapter::Scope;
    use crate::engine::EngineConfig;
    use crate::resource::{ManagedResource, ResourceId};
    use crate::testing::{CannedAnswers, FakeAdapter, resources};
    use tempfile::TempDir;

    fn engine<'a>(answers: &'a CannedAnswers, dir: &TempDir) -> TransitionEngine<'a> {
        let config = EngineConfig {
            batch_size: 5,
            batch_interval: Duration::ZERO,
            max_failures: 2,
            grace_period: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        };
        TransitionEngine::new(config, answers, dir.path().to_path_buf())
    }

    fn snapshot_of(entries: &[(&str, usize)]) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for (label, n) in entries {
            snapshot.insert(ResourceKind::new(*label), resources(&label.to_lowercase(), *n));
        }
        snapshot
    }

    #[tokio::test]
    async fn snapshot_refuses_existing_output_before_listing() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("snapshot.json");
        std::fs::write(&output, "{}").unwrap();
        let answers = CannedAnswers::new([]);
        let apps = Arc::new(FakeAdapter::new("App").global(resources("app", 2)));
        let orch = MaintenanceOrchestrator::new(vec![apps.clone()], engine(&answers, &dir), Enumerator::new(2));

        let err = orch.snapshot(&Vec::<Scope>::new(), &output).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MaintenanceError>(),
            Some(MaintenanceError::AlreadyExists(_))
        ));
        assert_eq!(apps.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn snapshot_honors_kind_filter() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("snapshot.json");
        let answers = CannedAnswers::new([]);
        let apps = Arc::new(FakeAdapter::new("App").global(resources("app", 2)));
        let workspaces = Arc::new(FakeAdapter::new("Workspace").in_scope("p1", resources("ws", 3)));
        let orch = MaintenanceOrchestrator::new(
            vec![apps.clone(), workspaces.clone()],
            engine(&answers, &dir),
            Enumerator::new(2),
        )
        .with_kinds(vec!["Workspace".into()]);

        let scopes = vec![Scope::new("p1", "churn", "carol")];
        let snapshot = orch.snapshot(&scopes, &output).await.unwrap();

        assert_eq!(snapshot.total(), 3);
        assert!(snapshot.get(&ResourceKind::new("App")).is_none());
        assert_eq!(Snapshot::load(&output).unwrap(), snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_drives_every_kind() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([true, true]);
        let apps = Arc::new(FakeAdapter::new("App"));
        let workspaces = Arc::new(FakeAdapter::new("Workspace"));
        let orch = MaintenanceOrchestrator::new(
            vec![apps.clone(), workspaces.clone()],
            engine(&answers, &dir),
            Enumerator::new(2),
        );

        let summary = orch.stop(&snapshot_of(&[("App", 2), ("Workspace", 3)])).await.unwrap();

        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.totals().confirmed, 5);
        assert_eq!(summary.exit_code(), EXIT_OK);
        assert_eq!(apps.stopped.lock().unwrap().len(), 2);
        assert_eq!(workspaces.stopped.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_kind_fails_before_any_work() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([true]);
        let apps = Arc::new(FakeAdapter::new("App"));
        let orch = MaintenanceOrchestrator::new(vec![apps.clone()], engine(&answers, &dir), Enumerator::new(2));

        let err = orch
            .stop(&snapshot_of(&[("App", 1), ("Dataset", 1)]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MaintenanceError>(),
            Some(MaintenanceError::UnknownKind(label)) if label == "Dataset"
        ));
        assert_eq!(apps.total_attempts(), 0);
        assert_eq!(answers.prompt_count(), 0);
    }

    #[tokio::test]
    async fn misshapen_ids_fail_before_any_work() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([true]);
        let jobs = Arc::new(FakeAdapter::new("Scheduled Job").id_shape(&["key", "projectId"]));
        let orch = MaintenanceOrchestrator::new(vec![jobs.clone()], engine(&answers, &dir), Enumerator::new(2));

        let mut snapshot = Snapshot::default();
        snapshot.insert(
            ResourceKind::new("Scheduled Job"),
            vec![
                ManagedResource::new(ResourceId::composite([("key", "k1"), ("projectId", "p1")]), "a", "o"),
                ManagedResource::new(ResourceId::simple("k2"), "b", "o"),
            ],
        );
        let err = orch.stop(&snapshot).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MaintenanceError>(),
            Some(MaintenanceError::IdentityMismatch { id, .. }) if id == "k2"
        ));
        assert_eq!(answers.prompt_count(), 0);
        assert_eq!(jobs.total_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_report_dir_stops_the_pass_with_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, "not a directory").unwrap();
        let answers = CannedAnswers::new([true, true]);
        let apps = Arc::new(FakeAdapter::new("App"));
        let engine = TransitionEngine::new(
            EngineConfig {
                batch_size: 5,
                batch_interval: Duration::ZERO,
                max_failures: 1,
                grace_period: Duration::from_secs(30),
                poll_interval: Duration::from_secs(1),
            },
            &answers,
            blocker,
        );
        let orch = MaintenanceOrchestrator::new(vec![apps.clone()], engine, Enumerator::new(2));

        assert!(orch.stop(&snapshot_of(&[("App", 2)])).await.is_err());
        assert_eq!(apps.total_attempts(), 0);
    }

    #[tokio::test]
    async fn unknown_kind_filter_is_rejected() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([]);
        let orch = MaintenanceOrchestrator::new(
            vec![Arc::new(FakeAdapter::new("App"))],
            engine(&answers, &dir),
            Enumerator::new(2),
        )
        .with_kinds(vec!["Notebook".into()]);

        assert!(orch.stop(&snapshot_of(&[("App", 1)])).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restore_skips_kinds_without_restart() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([true]);
        let apps = Arc::new(FakeAdapter::new("App"));
        let workspaces = Arc::new(FakeAdapter::new("Workspace").not_restartable());
        let orch = MaintenanceOrchestrator::new(
            vec![apps.clone(), workspaces.clone()],
            engine(&answers, &dir),
            Enumerator::new(2),
        );

        let summary = orch
            .restore(&snapshot_of(&[("App", 2), ("Workspace", 3)]))
            .await
            .unwrap();

        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.outcomes[0].0, ResourceKind::new("App"));
        assert_eq!(apps.total_attempts(), 2);
        assert_eq!(workspaces.total_attempts(), 0);
        assert_eq!(answers.prompt_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_take_precedence_over_declines_in_exit_code() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([true, false]);
        let items = resources("app", 2);
        let apps = Arc::new(FakeAdapter::new("App").fail_always(&items[0].id));
        let workspaces = Arc::new(FakeAdapter::new("Workspace"));
        let orch = MaintenanceOrchestrator::new(
            vec![apps.clone(), workspaces.clone()],
            engine(&answers, &dir),
            Enumerator::new(2),
        );
        let mut snapshot = snapshot_of(&[("Workspace", 1)]);
        snapshot.insert(ResourceKind::new("App"), items);

        let summary = orch.stop(&snapshot).await.unwrap();

        let totals = summary.totals();
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.declined, 1);
        assert_eq!(summary.exit_code(), EXIT_INCOMPLETE);
    }

    #[tokio::test]
    async fn declined_run_exits_with_declined_code() {
        let dir = TempDir::new().unwrap();
        let answers = CannedAnswers::new([false]);
        let orch = MaintenanceOrchestrator::new(
            vec![Arc::new(FakeAdapter::new("App"))],
            engine(&answers, &dir),
            Enumerator::new(2),
        );

        let summary = orch.stop(&snapshot_of(&[("App", 2)])).await.unwrap();
        assert_eq!(summary.exit_code(), EXIT_DECLINED);
    }
}
