//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::SourceKind;
use std::path::PathBuf;

/// regnotify - reliable change notification for a service registry
#[derive(Parser, Debug)]
#[command(
    name = "regnotify",
    author,
    version,
    about = "Registry change-notification dispatcher",
    long_about = "Pushes data-item change notifications to subscriber connections,\n\
                  retrying failed deliveries with linear backoff and dropping retries\n\
                  whose version has been superseded."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "REGNOTIFY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "REGNOTIFY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display configuration and the resulting retry schedule
    Info(InfoArgs),

    /// Run an in-process delivery simulation against simulated subscribers
    Simulate(SimulateArgs),
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "notify.toml", env = "REGNOTIFY_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "notify.toml", env = "REGNOTIFY_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "REGNOTIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of subscriber connections
    #[arg(long, default_value = "8", env = "REGNOTIFY_SUBSCRIBERS")]
    pub subscribers: usize,

    /// Subscribers that reject their first `--fail-first` notifications
    #[arg(long, default_value = "2")]
    pub flaky: usize,

    /// Rejections per flaky subscriber before it accepts
    #[arg(long, default_value = "2")]
    pub fail_first: u32,

    /// Every N-th call to any subscriber fails with a remote error (0 = never)
    #[arg(long, default_value = "0")]
    pub fail_every: u32,

    /// Subscriber response latency in milliseconds
    #[arg(long, default_value = "5")]
    pub latency_ms: u64,

    /// Changes emitted per round
    #[arg(long, default_value = "20", env = "REGNOTIFY_CHANGES")]
    pub changes: u64,

    /// Distinct data items the changes are spread over
    #[arg(long, default_value = "4")]
    pub items: u64,

    /// Emission rounds; each waits until every attempt is terminal
    #[arg(long, default_value = "1")]
    pub rounds: u32,

    /// Source kind of emitted changes
    #[arg(long, value_enum, default_value = "publish")]
    pub kind: ChangeKind,

    /// Supersede every N-th change with a newer version right away (0 = never)
    #[arg(long, default_value = "0")]
    pub supersede_every: u64,

    /// Pause between changes in milliseconds
    #[arg(long, default_value = "0")]
    pub interval_ms: u64,

    /// Give up waiting for in-flight attempts after this many seconds
    #[arg(long, default_value = "60")]
    pub settle_timeout_secs: u64,

    /// Override retry.max_retries
    #[arg(long, env = "REGNOTIFY_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Override retry.first_delay_ms
    #[arg(long, env = "REGNOTIFY_FIRST_DELAY_MS")]
    pub first_delay_ms: Option<u64>,

    /// Override retry.increment_delay_ms (may be negative)
    #[arg(long, env = "REGNOTIFY_INCREMENT_DELAY_MS", allow_hyphen_values = true)]
    pub increment_delay_ms: Option<i64>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "REGNOTIFY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Source kind of simulated changes
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
#[value(rename_all = "snake_case")]
pub enum ChangeKind {
    Publish,
    Synchronize,
    Backup,
    Snapshot,
    Clean,
    PublishTemp,
}

impl From<ChangeKind> for SourceKind {
    fn from(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Publish => SourceKind::Publish,
            ChangeKind::Synchronize => SourceKind::Synchronize,
            ChangeKind::Backup => SourceKind::Backup,
            ChangeKind::Snapshot => SourceKind::Snapshot,
            ChangeKind::Clean => SourceKind::Clean,
            ChangeKind::PublishTemp => SourceKind::PublishTemp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::try_parse_from(["regnotify", "simulate"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.subscribers, 8);
        assert_eq!(args.kind, ChangeKind::Publish);
        assert!(args.config.is_none());
        assert!(args.max_retries.is_none());
    }

    #[test]
    fn test_negative_increment_override() {
        let cli = Cli::try_parse_from([
            "regnotify",
            "simulate",
            "--increment-delay-ms",
            "-100",
            "--max-retries",
            "3",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.increment_delay_ms, Some(-100));
        assert_eq!(args.max_retries, Some(3));
    }

    #[test]
    fn test_kind_value_enum() {
        let cli = Cli::try_parse_from(["regnotify", "simulate", "--kind", "publish_temp"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(SourceKind::from(args.kind), SourceKind::PublishTemp);

        // Every CLI name matches the serde label of the kind it maps to
        for kind in ChangeKind::value_variants() {
            let name = kind.to_possible_value().unwrap();
            assert_eq!(name.get_name(), SourceKind::from(*kind).as_str());
        }

        assert!(Cli::try_parse_from(["regnotify", "simulate", "--kind", "teleport"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["regnotify", "-q", "-v", "validate"]).is_err());
    }
}
