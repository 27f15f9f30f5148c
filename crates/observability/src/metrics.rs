//! 变更通知指标收集模块
//!
//! Prometheus 计数器/直方图，以及用于 CLI 摘要输出的进程内统计。

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一次变更分发（按变更类型）
pub fn record_change_dispatched(kind: &str, notifiers: usize) {
    counter!("regnotify_changes_total", "kind" => kind.to_string()).increment(1);
    histogram!("regnotify_notifiers_per_change").record(notifiers as f64);
}

/// 记录一次扇出：一个变更 -> N 个活跃连接
pub fn record_fanout(notifier: &str, connections: usize) {
    counter!("regnotify_fanouts_total", "notifier" => notifier.to_string()).increment(1);
    counter!("regnotify_attempts_total", "notifier" => notifier.to_string())
        .increment(connections as u64);
    gauge!("regnotify_live_connections", "notifier" => notifier.to_string())
        .set(connections as f64);
}

/// 记录一次传输发送
pub fn record_send(notifier: &str) {
    counter!("regnotify_sends_total", "notifier" => notifier.to_string()).increment(1);
}

/// 记录一次发送失败
///
/// `reason`: `response`（对端返回失败）、`transport`（回调错误）或 `refused`（同步拒绝）
pub fn record_send_failure(notifier: &str, reason: &'static str) {
    counter!(
        "regnotify_send_failures_total",
        "notifier" => notifier.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录一次重试调度
pub fn record_retry_scheduled(notifier: &str, delay: Duration) {
    counter!("regnotify_retries_total", "notifier" => notifier.to_string()).increment(1);
    histogram!("regnotify_retry_delay_ms", "notifier" => notifier.to_string())
        .record(delay.as_secs_f64() * 1000.0);
}

/// 记录尝试的终态
pub fn record_attempt_outcome(notifier: &str, outcome: &'static str) {
    counter!(
        "regnotify_attempt_outcomes_total",
        "notifier" => notifier.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录时间轮中待触发的定时任务数
pub fn record_pending_timers(timer: &str, pending: usize) {
    gauge!("regnotify_timer_pending", "timer" => timer.to_string()).set(pending as f64);
}

/// 投递结果计数（与通知器无关的纯数据）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub attempts: u64,
    pub sends: u64,
    pub failures: u64,
    pub retries: u64,
    pub succeeded: u64,
    pub connection_dead: u64,
    pub aborted: u64,
    pub exhausted: u64,
    pub rejected: u64,
}

impl OutcomeCounts {
    /// 已到达终态的尝试数
    pub fn terminated(&self) -> u64 {
        self.succeeded + self.connection_dead + self.aborted + self.exhausted + self.rejected
    }
}

impl std::ops::AddAssign for OutcomeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.attempts += rhs.attempts;
        self.sends += rhs.sends;
        self.failures += rhs.failures;
        self.retries += rhs.retries;
        self.succeeded += rhs.succeeded;
        self.connection_dead += rhs.connection_dead;
        self.aborted += rhs.aborted;
        self.exhausted += rhs.exhausted;
        self.rejected += rhs.rejected;
    }
}

/// 投递指标聚合器
///
/// 在内存中聚合各通知器的计数与每轮收敛耗时，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryMetricsAggregator {
    /// 已发出的变更数
    pub changes: u64,

    /// 汇总计数
    pub totals: OutcomeCounts,

    /// 各通知器计数
    pub per_notifier: std::collections::BTreeMap<String, OutcomeCounts>,

    /// 每轮收敛耗时 (毫秒)
    pub settle_stats: RunningStats,
}

impl DeliveryMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个已发出的变更
    pub fn record_change(&mut self) {
        self.changes += 1;
    }

    /// 记录一轮从发出到无在途尝试的耗时
    pub fn record_settle_time(&mut self, elapsed: Duration) {
        self.settle_stats.push(elapsed.as_secs_f64() * 1000.0);
    }

    /// 用通知器的最新计数替换旧值
    pub fn update_notifier(&mut self, notifier: &str, counts: OutcomeCounts) {
        self.per_notifier.insert(notifier.to_string(), counts);
        self.totals = OutcomeCounts::default();
        for counts in self.per_notifier.values() {
            self.totals += *counts;
        }
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        let totals = self.totals;
        let rate = |n: u64| {
            if totals.attempts > 0 {
                n as f64 / totals.attempts as f64 * 100.0
            } else {
                0.0
            }
        };
        DeliverySummary {
            changes: self.changes,
            totals,
            success_rate: rate(totals.succeeded),
            abort_rate: rate(totals.aborted),
            exhaust_rate: rate(totals.exhausted),
            settle_time_ms: StatsSummary::from(&self.settle_stats),
            per_notifier: self.per_notifier.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub changes: u64,
    pub totals: OutcomeCounts,
    pub success_rate: f64,
    pub abort_rate: f64,
    pub exhaust_rate: f64,
    pub settle_time_ms: StatsSummary,
    pub per_notifier: std::collections::BTreeMap<String, OutcomeCounts>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = &self.totals;
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Changes emitted: {}", self.changes)?;
        writeln!(f, "Attempts: {}", t.attempts)?;
        writeln!(
            f,
            "Sends: {} (failures: {}, retries: {})",
            t.sends, t.failures, t.retries
        )?;
        writeln!(f, "Succeeded: {} ({:.2}%)", t.succeeded, self.success_rate)?;
        writeln!(f, "Aborted (stale): {} ({:.2}%)", t.aborted, self.abort_rate)?;
        writeln!(f, "Exhausted: {} ({:.2}%)", t.exhausted, self.exhaust_rate)?;
        writeln!(f, "Connection dead: {}", t.connection_dead)?;
        writeln!(f, "Scheduler rejected: {}", t.rejected)?;
        writeln!(f, "Settle time (ms): {}", self.settle_time_ms)?;

        if self.per_notifier.len() > 1 {
            writeln!(f, "Per notifier:")?;
            for (name, counts) in &self.per_notifier {
                writeln!(
                    f,
                    "  {}: attempts={}, succeeded={}, aborted={}, exhausted={}",
                    name, counts.attempts, counts.succeeded, counts.aborted, counts.exhausted
                )?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
