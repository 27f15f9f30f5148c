//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::NotifyConfig;
use retry_timer::RetryPolicy;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    retry: RetryInfo,
    response_timeout_ms: u64,
    timer: TimerInfo,
    notifiers: Vec<NotifierInfo>,
}

#[derive(Serialize)]
struct RetryInfo {
    max_retries: u32,
    first_delay_ms: u64,
    increment_delay_ms: i64,
    /// Delay before each retry, in order
    schedule_ms: Vec<u64>,
    /// Time from first failure to the last retry
    total_backoff_ms: u64,
}

#[derive(Serialize)]
struct TimerInfo {
    tick_ms: u64,
    ticks_per_wheel: usize,
    max_pending: usize,
    worker_concurrency: usize,
}

#[derive(Serialize)]
struct NotifierInfo {
    name: String,
    kinds: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &NotifyConfig) -> ConfigInfo {
    let schedule_ms: Vec<u64> = RetryPolicy::from_config(&config.retry)
        .schedule()
        .iter()
        .map(|d| d.as_millis() as u64)
        .collect();

    ConfigInfo {
        retry: RetryInfo {
            max_retries: config.retry.max_retries,
            first_delay_ms: config.retry.first_delay_ms,
            increment_delay_ms: config.retry.increment_delay_ms,
            total_backoff_ms: schedule_ms.iter().sum(),
            schedule_ms,
        },
        response_timeout_ms: config.transport.response_timeout_ms,
        timer: TimerInfo {
            tick_ms: config.timer.tick_ms,
            ticks_per_wheel: config.timer.ticks_per_wheel,
            max_pending: config.timer.max_pending,
            worker_concurrency: config.timer.worker_concurrency,
        },
        notifiers: config
            .notifiers
            .iter()
            .map(|n| NotifierInfo {
                name: n.name.clone(),
                kinds: n.kinds.iter().map(|k| k.to_string()).collect(),
            })
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               regnotify Configuration                        ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let retry = &info.retry;
    println!("🔁 Retry");
    println!("   ├─ Max retries: {}", retry.max_retries);
    println!("   ├─ First delay: {} ms", retry.first_delay_ms);
    println!("   ├─ Increment: {} ms", retry.increment_delay_ms);
    println!("   ├─ Schedule (ms): {:?}", retry.schedule_ms);
    println!("   └─ Total backoff: {} ms", retry.total_backoff_ms);

    println!("\n📡 Transport");
    println!("   └─ Response timeout: {} ms", info.response_timeout_ms);

    let timer = &info.timer;
    println!("\n⏱️  Timer Wheel");
    println!("   ├─ Tick: {} ms", timer.tick_ms);
    println!("   ├─ Ticks per wheel: {}", timer.ticks_per_wheel);
    println!("   ├─ Max pending: {}", timer.max_pending);
    println!("   └─ Worker concurrency: {}", timer.worker_concurrency);

    println!("\n📤 Notifiers ({})", info.notifiers.len());
    for (i, notifier) in info.notifiers.iter().enumerate() {
        let prefix = if i == info.notifiers.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!("   {} {} [{}]", prefix, notifier.name, notifier.kinds.join(", "));
    }

    println!();
}
