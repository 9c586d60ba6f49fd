use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use maintctl::adapter::{AssumeYes, ConfirmationSource, ResourceKindAdapter, ScopeProvider};
use maintctl::cli::{Cli, Command};
use maintctl::config::MaintenanceConfig;
use maintctl::engine::TransitionEngine;
use maintctl::enumerator::Enumerator;
use maintctl::http::{HttpKindAdapter, HttpScopeProvider, NoScopeSource, PlatformClient, RetryConfig};
use maintctl::orchestrator::{EXIT_FATAL, EXIT_OK, MaintenanceOrchestrator};
use maintctl::snapshot::Snapshot;
use maintctl::ui::{self, ConsolePrompt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    // Reading a snapshot needs neither config nor network.
    if let Command::Status { snapshot } = &cli.command {
        let snapshot = Snapshot::load(snapshot)?;
        ui::print_snapshot(&snapshot);
        return Ok(EXIT_OK);
    }

    let mut config = MaintenanceConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;
    info!(
        base_url = %config.base_url,
        kinds = config.kinds.len(),
        batch_size = config.engine.batch_size,
        max_failures = config.engine.max_failures,
        grace_period_secs = config.engine.grace_period_secs,
        "Loaded configuration"
    );

    let client = Arc::new(PlatformClient::new(
        config.base_url.clone(),
        config.api_key.clone(),
        config.api_key_header.clone(),
        config.verify_tls,
        RetryConfig {
            max_attempts: config.enumeration.fetch_retries,
            base_delay_ms: config.enumeration.fetch_base_delay_ms,
        },
    )?);
    let mut adapters: Vec<Arc<dyn ResourceKindAdapter>> = Vec::with_capacity(config.kinds.len());
    for kind in &config.kinds {
        adapters.push(Arc::new(HttpKindAdapter::new(kind.clone(), client.clone())?));
    }

    let confirm: Box<dyn ConfirmationSource> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(ConsolePrompt::new())
    };
    let interactive = std::io::stderr().is_terminal();
    let engine = TransitionEngine::new(
        config.engine.to_engine_config(),
        confirm.as_ref(),
        config.report_dir.clone(),
    )
    .with_progress(interactive);
    let enumerator = Enumerator::new(config.enumeration.concurrency);

    match cli.command {
        Command::Snapshot { output, kinds } => {
            let scopes: Box<dyn ScopeProvider> = match config.scopes.clone() {
                Some(scopes) => Box::new(HttpScopeProvider::new(scopes, client.clone())),
                None => Box::new(NoScopeSource),
            };
            let orchestrator = MaintenanceOrchestrator::new(adapters, engine, enumerator).with_kinds(kinds);
            let snapshot = orchestrator.snapshot(scopes.as_ref(), &output).await?;
            ui::print_snapshot(&snapshot);
            println!("saved to {}", output.display());
            Ok(EXIT_OK)
        }
        Command::Stop { snapshot, kinds } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let orchestrator = MaintenanceOrchestrator::new(adapters, engine, enumerator)
                .with_kinds(kinds)
                .with_output(true);
            let summary = orchestrator.stop(&snapshot).await?;
            ui::print_totals(&summary);
            Ok(summary.exit_code())
        }
        Command::Restore { snapshot, kinds } => {
            let snapshot = Snapshot::load(&snapshot)?;
            let orchestrator = MaintenanceOrchestrator::new(adapters, engine, enumerator)
                .with_kinds(kinds)
                .with_output(true);
            let summary = orchestrator.restore(&snapshot).await?;
            ui::print_totals(&summary);
            Ok(summary.exit_code())
        }
        Command::Status { .. } => Ok(EXIT_OK),
    }
}
