//! Terminal output: phase progress bars, colored summaries and the
//! confirmation prompt.
//!
//! Uses `indicatif` for progress and `console` for styling and line input.
//! Structured logs go through `tracing` on stderr; this module only renders
//! what an operator watching the window needs to see.

use std::io;
use std::time::Duration;

use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::adapter::{ConfirmationSource, is_affirmative};
use crate::engine::{TransitionOutcome, TransitionReport};
use crate::orchestrator::RunSummary;
use crate::resource::ResourceKind;
use crate::snapshot::Snapshot;

/// Progress for one phase (invocation or polling) of a transition run.
pub struct PhaseProgress {
    pb: ProgressBar,
    red: Style,
    yellow: Style,
}

impl PhaseProgress {
    /// A bar of `len` items; hidden bars swallow all output.
    pub fn new(visible: bool, len: usize, message: String) -> Self {
        let pb = if visible {
            let pb = ProgressBar::new(len as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.cyan} {msg} [{bar:30}] {pos}/{len}")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message);

        Self {
            pb,
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn hidden() -> Self {
        Self::new(false, 0, String::new())
    }

    pub fn succeeded(&self) {
        self.pb.inc(1);
    }

    pub fn retry(&self, attempt: u32, max: u32, name: &str, reason: &str) {
        self.pb.println(format!(
            "  {} Retry {attempt}/{max} '{name}': {reason}",
            self.yellow.apply_to("↻")
        ));
    }

    pub fn failed(&self, name: &str, reason: &str) {
        self.pb.inc(1);
        self.pb.println(format!("  {} '{name}': {reason}", self.red.apply_to("✗")));
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Blocking yes/no prompt on the controlling terminal.
pub struct ConsolePrompt {
    term: Term,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for ConsolePrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationSource for ConsolePrompt {
    fn confirm(&self, prompt: &str) -> anyhow::Result<bool> {
        let answer = self
            .term
            .write_str(&format!("{prompt} [y/N] "))
            .and_then(|()| self.term.read_line());
        Ok(accepted(answer))
    }
}

/// An unreadable terminal counts as a "no".
fn accepted(answer: io::Result<String>) -> bool {
    match answer {
        Ok(answer) => is_affirmative(&answer),
        Err(e) => {
            warn!(error = %e, "Unable to read confirmation, treating as no");
            false
        }
    }
}

/// Prints the per-kind result of a transition run.
pub fn print_outcome(kind: &ResourceKind, outcome: &TransitionOutcome) {
    let green = Style::new().green().bold();
    let red = Style::new().red().bold();
    let yellow = Style::new().yellow();
    match outcome {
        TransitionOutcome::Skipped => {
            println!("  {} {kind}: nothing to do", green.apply_to("·"));
        }
        TransitionOutcome::Declined => {
            println!("  {} {kind}: declined, no action taken", yellow.apply_to("–"));
        }
        TransitionOutcome::Completed(report) => print_report(report, &green, &red),
    }
}

fn print_report(report: &TransitionReport, green: &Style, red: &Style) {
    if report.is_clean() {
        println!(
            "  {} {}: {} of {} confirmed ({}ms)",
            green.apply_to("✓"),
            report.kind,
            report.confirmed.len(),
            report.requested,
            report.duration_ms
        );
        return;
    }
    println!(
        "  {} {}: {} confirmed, {} failed, {} timed out",
        red.apply_to("✗"),
        report.kind,
        report.confirmed.len(),
        report.failed.len(),
        report.timed_out.len()
    );
    if let Some(path) = &report.report_path {
        println!("    failure report: {}", path.display());
    }
    if let Some(error) = &report.report_error {
        println!("    {} failure report not written: {error}", red.apply_to("!"));
    }
}

/// Prints the totals line closing a stop or restore pass.
pub fn print_totals(summary: &RunSummary) {
    let totals = summary.totals();
    let style = if totals.failed + totals.timed_out > 0 {
        Style::new().red().bold()
    } else {
        Style::new().green().bold()
    };
    println!(
        "{}",
        style.apply_to(format!(
            "─── {} confirmed, {} failed, {} timed out, {} kinds declined ───",
            totals.confirmed, totals.failed, totals.timed_out, totals.declined
        ))
    );
}

/// Prints resource counts per kind for a snapshot.
pub fn print_snapshot(snapshot: &Snapshot) {
    let bold = Style::new().bold();
    println!("{}", bold.apply_to("─── Snapshot ───"));
    for (kind, resources) in snapshot.iter() {
        println!("  {kind}: {}", resources.len());
    }
    println!("  total: {}", snapshot.total());
}
