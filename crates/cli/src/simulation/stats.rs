//! Simulation statistics.

use std::time::Duration;

use observability::DeliveryMetricsAggregator;

/// Statistics from a simulation run
#[derive(Debug, Clone, Default)]
pub struct SimulationStats {
    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Subscriber connections notified
    pub subscribers: usize,

    /// Rounds completed
    pub rounds: u32,

    /// Stopped early by a shutdown signal or the settle timeout
    pub interrupted: bool,

    /// Retry timers dropped when the wheel was stopped
    pub dropped_timers: usize,

    /// (subscriber, item) pairs whose delivered version equals the item's
    /// current version
    pub up_to_date_pairs: u64,

    /// All (subscriber, item) pairs
    pub total_pairs: u64,

    /// Delivery counters and settle times
    pub delivery: DeliveryMetricsAggregator,
}

impl SimulationStats {
    /// Share of (subscriber, item) pairs holding the latest version
    pub fn convergence(&self) -> f64 {
        if self.total_pairs > 0 {
            self.up_to_date_pairs as f64 / self.total_pairs as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Attempts still in flight when the run ended
    pub fn in_flight(&self) -> u64 {
        let totals = self.delivery.totals;
        totals.attempts.saturating_sub(totals.terminated())
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  Simulation Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Subscribers: {}", self.subscribers);
        println!("   ├─ Rounds: {}", self.rounds);
        println!(
            "   ├─ Converged pairs: {}/{} ({:.2}%)",
            self.up_to_date_pairs,
            self.total_pairs,
            self.convergence()
        );
        println!("   ├─ In flight at exit: {}", self.in_flight());
        println!("   └─ Timers dropped at stop: {}", self.dropped_timers);

        if self.interrupted {
            println!("\n⚠️  Run was interrupted before all attempts settled");
        }

        println!("\n{}", self.delivery.summary());
    }
}
