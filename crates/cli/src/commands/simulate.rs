//! `simulate` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::NotifyConfig;
use tracing::{info, warn};

use crate::cli::SimulateArgs;
use crate::error::CliError;
use crate::simulation::{Simulation, SimulationConfig};

/// Execute the `simulate` command
pub async fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let notify = load_config(args)?;

    if args.items == 0 {
        return Err(CliError::invalid_argument("items", "must be > 0").into());
    }
    if args.flaky > args.subscribers {
        warn!(
            flaky = args.flaky,
            subscribers = args.subscribers,
            "More flaky subscribers than subscribers, all are flaky"
        );
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        max_retries = notify.retry.max_retries,
        first_delay_ms = notify.retry.first_delay_ms,
        increment_delay_ms = notify.retry.increment_delay_ms,
        notifiers = notify.notifiers.len(),
        "Configuration loaded"
    );

    let simulation = Simulation::new(SimulationConfig {
        notify,
        subscribers: args.subscribers,
        flaky: args.flaky,
        fail_first: args.fail_first,
        fail_every: args.fail_every,
        latency: Duration::from_millis(args.latency_ms),
        changes: args.changes,
        items: args.items,
        rounds: args.rounds,
        kind: args.kind.into(),
        supersede_every: args.supersede_every,
        interval: Duration::from_millis(args.interval_ms),
        settle_timeout: Duration::from_secs(args.settle_timeout_secs),
    });

    let stats = simulation
        .run(shutdown_signal())
        .await
        .context("Simulation execution failed")?;

    info!(
        rounds = stats.rounds,
        attempts = stats.delivery.totals.attempts,
        succeeded = stats.delivery.totals.succeeded,
        in_flight = stats.in_flight(),
        duration_secs = stats.duration.as_secs_f64(),
        "Simulation finished"
    );
    stats.print_summary();

    Ok(())
}

/// Config file (or defaults) with CLI retry overrides applied, validated
fn load_config(args: &SimulateArgs) -> Result<NotifyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No configuration file given, using defaults");
            NotifyConfig::default()
        }
    };

    if let Some(max_retries) = args.max_retries {
        info!(max_retries, "Overriding retry.max_retries from CLI");
        config.retry.max_retries = max_retries;
    }
    if let Some(first_delay_ms) = args.first_delay_ms {
        info!(first_delay_ms, "Overriding retry.first_delay_ms from CLI");
        config.retry.first_delay_ms = first_delay_ms;
    }
    if let Some(increment_delay_ms) = args.increment_delay_ms {
        info!(increment_delay_ms, "Overriding retry.increment_delay_ms from CLI");
        config.retry.increment_delay_ms = increment_delay_ms;
    }

    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Commands};

    fn simulate_args(extra: &[&str]) -> SimulateArgs {
        let mut argv = vec!["regnotify", "simulate"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Simulate(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_overrides_applied_to_defaults() {
        let args = simulate_args(&["--max-retries", "3", "--first-delay-ms", "100"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.first_delay_ms, 100);
        assert_eq!(config.retry.increment_delay_ms, 3000);
    }

    #[test]
    fn test_missing_config_file() {
        let args = simulate_args(&["--config", "/nonexistent/notify.toml"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
