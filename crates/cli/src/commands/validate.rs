//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{NotifyConfig, SourceKind};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    max_retries: u32,
    first_delay_ms: u64,
    increment_delay_ms: i64,
    response_timeout_ms: u64,
    notifier_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    max_retries: config.retry.max_retries,
                    first_delay_ms: config.retry.first_delay_ms,
                    increment_delay_ms: config.retry.increment_delay_ms,
                    response_timeout_ms: config.transport.response_timeout_ms,
                    notifier_count: config.notifiers.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &NotifyConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.notifiers.is_empty() {
        warnings.push("No notifiers configured - changes will not be delivered".to_string());
    } else {
        let unrouted: Vec<&str> = SourceKind::ALL
            .iter()
            .filter(|kind| !config.notifiers.iter().any(|n| n.kinds.contains(*kind)))
            .map(SourceKind::as_str)
            .collect();
        if !unrouted.is_empty() {
            warnings.push(format!(
                "Source kinds without a notifier (dropped): {}",
                unrouted.join(", ")
            ));
        }
    }

    if config.retry.max_retries == 0 {
        warnings.push("retry.max_retries is 0 - failed deliveries are never retried".to_string());
    }

    if config.retry.increment_delay_ms < 0 {
        warnings.push(format!(
            "retry.increment_delay_ms is negative ({}) - later delays are floored at 0",
            config.retry.increment_delay_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Max retries: {}", summary.max_retries);
            println!(
                "  Backoff: {} ms + {} ms per retry",
                summary.first_delay_ms, summary.increment_delay_ms
            );
            println!("  Response timeout: {} ms", summary.response_timeout_ms);
            println!("  Notifiers: {}", summary.notifier_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
