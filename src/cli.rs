//! Command-line interface for maintctl, built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (snapshot, stop, restore,
//! status) and global flags that override `maintctl.toml`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, MaintenanceConfig};

/// maintctl: put a compute platform into maintenance mode and back.
#[derive(Debug, Parser)]
#[command(name = "maintctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, env = "MAINTCTL_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Answer yes to every confirmation prompt.
    #[arg(long, short, global = true, default_value_t = false)]
    pub yes: bool,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Resources per batch of stop/start requests.
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Seconds to wait between batches.
    #[arg(long, global = true)]
    pub batch_interval: Option<u64>,

    /// Failed attempts before a resource is given up on.
    #[arg(long, global = true)]
    pub max_failures: Option<u32>,

    /// Seconds to wait for resources to reach their target state.
    #[arg(long, global = true)]
    pub grace_period: Option<u64>,

    /// Parallel listing calls during enumeration.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Records every active resource to a new snapshot file.
    Snapshot {
        /// Snapshot file to create; an existing file is never overwritten.
        #[arg(long, short)]
        output: PathBuf,

        /// Only capture these kinds (repeatable).
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },

    /// Stops every resource recorded in a snapshot.
    Stop {
        #[arg(long, short)]
        snapshot: PathBuf,

        /// Only stop these kinds (repeatable).
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },

    /// Restarts the resources recorded in a snapshot, for kinds that support it.
    Restore {
        #[arg(long, short)]
        snapshot: PathBuf,

        /// Only restore these kinds (repeatable).
        #[arg(long = "kind")]
        kinds: Vec<String>,
    },

    /// Shows per-kind counts of a snapshot without contacting the platform.
    Status {
        #[arg(long, short)]
        snapshot: PathBuf,
    },
}

impl Cli {
    /// Applies flag overrides on top of the file and environment values.
    pub fn apply(&self, config: &mut MaintenanceConfig) {
        if let Some(n) = self.batch_size {
            config.engine.batch_size = n;
        }
        if let Some(secs) = self.batch_interval {
            config.engine.batch_interval_secs = secs;
        }
        if let Some(n) = self.max_failures {
            config.engine.max_failures = n;
        }
        if let Some(secs) = self.grace_period {
            config.engine.grace_period_secs = secs;
        }
        if let Some(n) = self.concurrency {
            config.enumeration.concurrency = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_snapshot_subcommand() {
        let cli = Cli::parse_from([
            "maintctl",
            "snapshot",
            "--output",
            "window.json",
            "--kind",
            "App",
            "--kind",
            "Workspace",
        ]);
        match cli.command {
            Command::Snapshot { output, kinds } => {
                assert_eq!(output, PathBuf::from("window.json"));
                assert_eq!(kinds, vec!["App", "Workspace"]);
            }
            _ => panic!("expected Snapshot command"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "maintctl",
            "--yes",
            "--batch-size",
            "10",
            "--grace-period",
            "120",
            "stop",
            "-s",
            "window.json",
            "--verbose",
        ]);
        assert!(cli.yes);
        assert!(cli.verbose);
        assert_eq!(cli.batch_size, Some(10));
        assert_eq!(cli.grace_period, Some(120));
        assert!(matches!(cli.command, Command::Stop { ref kinds, .. } if kinds.is_empty()));
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "maintctl",
            "--max-failures",
            "2",
            "--concurrency",
            "4",
            "status",
            "--snapshot",
            "window.json",
        ]);
        let mut config = MaintenanceConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.engine.max_failures, 2);
        assert_eq!(config.enumeration.concurrency, 4);
        assert_eq!(config.engine.batch_size, 5);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
