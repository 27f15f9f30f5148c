//! Simulation runner - wires the in-memory collaborators to a registry.
//!
//! Subscribers answer through `SpawningTransport`, retries go through a real
//! `HashedWheelTimer`, and every round waits until no attempt is in flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use adapters::{
    InMemoryConnectionDirectory, SimulatedSubscribers, SpawningTransport, SubscriberBehavior,
    VersionTable,
};
use anyhow::Result;
use contracts::{DataItemChange, NotifyConfig, SourceKind};
use dispatcher::{NotifierDeps, NotifierRegistry};
use retry_timer::{HashedWheelTimer, LogFailureHandler};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::SimulationStats;
use crate::error::CliError;

const PARTITION: &str = "sim";
const TIMER_NAME: &str = "notify-retry";

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Retry, timer and notifier configuration
    pub notify: NotifyConfig,
    pub subscribers: usize,
    /// The first `flaky` subscribers reject their first `fail_first` calls
    pub flaky: usize,
    pub fail_first: u32,
    pub fail_every: u32,
    pub latency: Duration,
    /// Changes per round
    pub changes: u64,
    pub items: u64,
    pub rounds: u32,
    pub kind: SourceKind,
    /// Every N-th change is immediately followed by a newer version (0 = never)
    pub supersede_every: u64,
    pub interval: Duration,
    pub settle_timeout: Duration,
}

enum Settle {
    Quiet,
    Interrupted,
    TimedOut { in_flight: u64 },
}

/// In-process delivery simulation
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Run every round, stopping early when `shutdown` completes
    pub async fn run<F>(self, shutdown: F) -> Result<SimulationStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let config = &self.config;
        let start = Instant::now();

        let directory = Arc::new(InMemoryConnectionDirectory::new());
        let subscribers = Arc::new(SimulatedSubscribers::new());
        let peers: Vec<String> = (0..config.subscribers)
            .map(|i| format!("subscriber-{i:03}"))
            .collect();
        for (i, peer) in peers.iter().enumerate() {
            subscribers.add(
                peer.clone(),
                SubscriberBehavior {
                    latency: config.latency,
                    fail_first: if i < config.flaky { config.fail_first } else { 0 },
                    fail_every: config.fail_every,
                },
            );
            directory.connect(peer.clone());
        }

        let versions = Arc::new(VersionTable::new());
        let transport = Arc::new(SpawningTransport::new(
            Arc::clone(&subscribers),
            Handle::current(),
        ));
        let timer = Arc::new(
            HashedWheelTimer::new(TIMER_NAME, &config.notify.timer, Arc::new(LogFailureHandler))
                .map_err(|e| CliError::simulation(e.to_string()))?,
        );

        let deps = NotifierDeps {
            directory: directory.clone(),
            oracle: versions.clone(),
            transport: transport.clone(),
            scheduler: timer.clone(),
        };
        let registry = NotifierRegistry::from_config(&config.notify, &deps)
            .map_err(|e| CliError::simulation(e.to_string()))?;
        if registry.is_empty() {
            warn!("No notifiers configured, changes will not be delivered");
        }

        info!(
            subscribers = config.subscribers,
            flaky = config.flaky,
            notifiers = registry.len(),
            rounds = config.rounds,
            changes = config.changes,
            "Simulation started"
        );

        let mut stats = SimulationStats {
            subscribers: config.subscribers,
            ..Default::default()
        };
        let items = config.items.max(1);
        let mut seq: u64 = 0;

        'rounds: for round in 1..=config.rounds {
            let round_start = Instant::now();

            for _ in 0..config.changes {
                let item = format!("item-{:03}", seq % items);
                seq += 1;
                emit(&registry, &versions, &item, config.kind, &mut stats);
                if config.supersede_every > 0 && seq.is_multiple_of(config.supersede_every) {
                    emit(&registry, &versions, &item, config.kind, &mut stats);
                }

                if !config.interval.is_zero() {
                    tokio::select! {
                        _ = &mut shutdown => {
                            stats.interrupted = true;
                            break 'rounds;
                        }
                        _ = tokio::time::sleep(config.interval) => {}
                    }
                }
            }

            match wait_for_quiescence(&registry, &timer, &mut shutdown, config).await {
                Settle::Quiet => {
                    let elapsed = round_start.elapsed();
                    stats.delivery.record_settle_time(elapsed);
                    stats.rounds = round;
                    info!(
                        round,
                        settle_ms = elapsed.as_millis() as u64,
                        "Round settled"
                    );
                }
                Settle::Interrupted => {
                    warn!(round, "Shutdown requested, stopping simulation");
                    stats.interrupted = true;
                    break;
                }
                Settle::TimedOut { in_flight } => {
                    warn!(round, in_flight, "Settle timeout reached, stopping simulation");
                    stats.interrupted = true;
                    break;
                }
            }
        }

        stats.dropped_timers = timer.stop();
        transport.close();

        for (name, snapshot) in registry.metrics() {
            stats
                .delivery
                .update_notifier(&name, snapshot.outcome_counts());
        }

        for index in 0..items.min(seq) {
            let item = format!("item-{index:03}");
            let Some(current) = versions.get(PARTITION, &item) else {
                continue;
            };
            for peer in &peers {
                stats.total_pairs += 1;
                if subscribers.delivered_version(peer, PARTITION, &item) == Some(current) {
                    stats.up_to_date_pairs += 1;
                }
            }
        }

        stats.duration = start.elapsed();
        Ok(stats)
    }
}

/// Advance `item` by one version and dispatch the change
fn emit(
    registry: &NotifierRegistry,
    versions: &VersionTable,
    item: &str,
    kind: SourceKind,
    stats: &mut SimulationStats,
) {
    let version = versions.bump(PARTITION, item);
    let mut change = DataItemChange::new(item, PARTITION, version, kind);
    if version > 1 {
        change = change.with_previous_version(version - 1);
    }
    let notifiers = registry.dispatch(&change);
    stats.delivery.record_change();
    debug!(item, version, notifiers, "Change emitted");
}

async fn wait_for_quiescence<F>(
    registry: &NotifierRegistry,
    timer: &HashedWheelTimer,
    shutdown: &mut Pin<&mut F>,
    config: &SimulationConfig,
) -> Settle
where
    F: Future<Output = ()>,
{
    let deadline = Instant::now() + config.settle_timeout;
    let poll = config.notify.timer.tick().max(Duration::from_millis(10));

    loop {
        let in_flight = registry.in_flight();
        observability::record_pending_timers(timer.name(), timer.pending());
        if in_flight == 0 {
            return Settle::Quiet;
        }
        if Instant::now() >= deadline {
            return Settle::TimedOut { in_flight };
        }
        tokio::select! {
            _ = shutdown.as_mut() => return Settle::Interrupted,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        let mut notify = NotifyConfig::default();
        notify.retry.max_retries = 5;
        notify.retry.first_delay_ms = 20;
        notify.retry.increment_delay_ms = 10;
        notify.timer.tick_ms = 5;
        notify.transport.response_timeout_ms = 500;

        SimulationConfig {
            notify,
            subscribers: 3,
            flaky: 1,
            fail_first: 2,
            fail_every: 0,
            latency: Duration::from_millis(1),
            changes: 4,
            items: 2,
            rounds: 2,
            kind: SourceKind::Publish,
            supersede_every: 0,
            interval: Duration::ZERO,
            settle_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_simulation_converges() {
        let stats = Simulation::new(config())
            .run(std::future::pending())
            .await
            .unwrap();

        assert!(!stats.interrupted);
        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.delivery.changes, 8);
        assert_eq!(stats.delivery.totals.attempts, 24);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.delivery.totals.retries, 2);
        assert_eq!(stats.total_pairs, 6);
        assert_eq!(stats.up_to_date_pairs, 6);
    }

    #[tokio::test]
    async fn test_superseded_changes_still_converge() {
        let mut config = config();
        config.supersede_every = 1;
        config.rounds = 1;

        let stats = Simulation::new(config)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.delivery.changes, 8);
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.up_to_date_pairs, stats.total_pairs);
    }

    #[tokio::test]
    async fn test_unrouted_kind_delivers_nothing() {
        let mut config = config();
        config.kind = SourceKind::Clean;
        config.rounds = 1;

        let stats = Simulation::new(config)
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.delivery.totals.attempts, 0);
        assert_eq!(stats.up_to_date_pairs, 0);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_settling() {
        let mut config = config();
        config.notify.retry.first_delay_ms = 60_000;
        config.rounds = 1;

        let stats = Simulation::new(config)
            .run(tokio::time::sleep(Duration::from_millis(50)))
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.rounds, 0);
        assert!(stats.in_flight() > 0);
        assert!(stats.dropped_timers > 0);
    }
}
