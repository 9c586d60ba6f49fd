//! Batched state-transition engine.
//!
//! Drives every resource of one kind from its current state to the state a
//! [`Verb`](crate::resource::Verb) aims for:
//!
//! 1. confirmation gate (nothing is issued on a non-affirmative answer),
//! 2. rate-limited batched invocation with a per-resource failure budget,
//! 3. deadline-bounded polling for the target state,
//! 4. a failure report for anything that failed or timed out.
//!
//! Each call to [`TransitionEngine::run`] is an isolated run: the ledger and
//! queues it builds are dropped when it returns.

mod batch;
mod ledger;
mod poll;
mod report;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{error, info, warn};

pub use batch::{BatchCallResult, BatchPolicy, FailedResource, invoke_batched};
pub use ledger::{FailureLedger, Strike};
pub use poll::{PollOutcome, await_target_state};
pub use report::{FailureReport, TransitionReport, run_id};

use crate::adapter::{ConfirmationSource, ResourceKindAdapter};
use crate::resource::TransitionRequest;
use crate::ui::PhaseProgress;

/// Operational limits for a transition run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub max_failures: u32,
    pub grace_period: Duration,
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_interval: Duration::from_secs(5),
            max_failures: 5,
            grace_period: Duration::from_secs(600),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            batch_size: self.batch_size,
            batch_interval: self.batch_interval,
            max_failures: self.max_failures,
        }
    }
}

/// How a single kind's run ended.
#[derive(Debug)]
pub enum TransitionOutcome {
    /// No resources to transition; the operator was not prompted.
    Skipped,
    /// The operator declined; nothing was issued.
    Declined,
    Completed(TransitionReport),
}

pub struct TransitionEngine<'a> {
    config: EngineConfig,
    confirm: &'a dyn ConfirmationSource,
    report_dir: PathBuf,
    show_progress: bool,
}

impl<'a> TransitionEngine<'a> {
    pub fn new(config: EngineConfig, confirm: &'a dyn ConfirmationSource, report_dir: PathBuf) -> Self {
        Self {
            config,
            confirm,
            report_dir,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(
        &self,
        adapter: &dyn ResourceKindAdapter,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome> {
        let TransitionRequest {
            verb,
            kind,
            resources,
        } = request;
        if adapter.kind() != kind {
            bail!("Adapter for '{}' cannot transition '{kind}'", adapter.kind());
        }
        if resources.is_empty() {
            info!(kind = %kind, "No resources to {verb}");
            return Ok(TransitionOutcome::Skipped);
        }

        self.check_report_dir()?;

        let requested = resources.len();
        let prompt = format!("Are you sure you want to {verb} these {requested} {kind}s?");
        if !self.confirm.confirm(&prompt).context("reading confirmation")? {
            info!(kind = %kind, "Declined, no action taken");
            return Ok(TransitionOutcome::Declined);
        }

        let started_at = Utc::now();
        let mut failure_report = FailureReport {
            run_id: run_id(&kind, verb, started_at),
            kind: kind.clone(),
            verb,
            created_at: started_at,
            failed: Vec::new(),
            timeout: Vec::new(),
        };

        let progress = PhaseProgress::new(self.show_progress, requested, format!("{verb} {kind}s"));
        let calls = invoke_batched(adapter, verb, resources, &self.config.batch_policy(), &progress).await;
        progress.finish();
        info!(
            kind = %kind,
            succeeded = calls.success.len(),
            failed = calls.failed.len(),
            "Requests issued"
        );

        failure_report.failed = calls.failed;
        let mut report_path = None;
        let mut report_error = None;
        if !failure_report.is_empty() {
            error!(
                kind = %kind,
                failed = failure_report.failed.len(),
                "Resources failed to {verb}"
            );
            // A failed write must not stop the polling phase: requests already
            // went out for everything in `calls.success`.
            match self.persist(&failure_report) {
                Ok(path) => report_path = Some(path),
                Err(e) => report_error = Some(format!("{e:#}")),
            }
        }

        let progress = PhaseProgress::new(
            self.show_progress,
            calls.success.len(),
            format!("waiting for {kind}s to {verb}"),
        );
        let polled = await_target_state(
            adapter,
            verb,
            calls.success,
            self.config.grace_period,
            self.config.poll_interval,
            &progress,
        )
        .await;
        progress.finish();

        if !polled.timed_out.is_empty() || report_error.is_some() {
            failure_report.timeout = polled.timed_out.clone();
            if !polled.timed_out.is_empty() {
                error!(kind = %kind, timed_out = polled.timed_out.len(), "Resources timed out");
            }
            match self.persist(&failure_report) {
                Ok(path) => {
                    report_path = Some(path);
                    report_error = None;
                }
                Err(e) => report_error = Some(format!("{e:#}")),
            }
        }

        let completed_at = Utc::now();
        Ok(TransitionOutcome::Completed(TransitionReport {
            run_id: failure_report.run_id,
            kind,
            verb,
            requested,
            confirmed: polled.confirmed,
            failed: failure_report.failed,
            timed_out: polled.timed_out,
            report_path,
            report_error,
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds(),
        }))
    }

    /// Makes sure failure reports can be written before anything is issued.
    fn check_report_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.report_dir).with_context(|| {
            format!("report directory {} is unusable", self.report_dir.display())
        })
    }

    /// Writes the report. On failure the full report is logged so the list
    /// is never lost.
    fn persist(&self, report: &FailureReport) -> Result<PathBuf> {
        match report.write(&self.report_dir) {
            Ok(path) => {
                warn!(path = %path.display(), "Failure report saved");
                Ok(path)
            }
            Err(e) => {
                error!(
                    report = %serde_json::to_string(report).unwrap_or_default(),
                    error = %e,
                    "Unable to write failure report"
                );
                Err(e).context("writing failure report")
            }
        }
    }
}
