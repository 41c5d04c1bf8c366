//! Replay 指标收集模块
//!
//! 记录分发器的运行指标，并在内存中聚合回放时间偏差统计。

use metrics::{counter, gauge, histogram};

/// 记录一次预加载
pub fn record_op_preloaded() {
    counter!("replay_ops_preloaded_total").increment(1);
}

/// 记录一次入队分发
pub fn record_op_dispatched(policy: &str) {
    counter!(
        "replay_ops_dispatched_total",
        "policy" => policy.to_string()
    )
    .increment(1);
}

/// 记录按时回放的滞后 (实际入队时刻晚于计划时刻的毫秒数)
pub fn record_dispatch_lag_ms(lag_ms: f64) {
    histogram!("replay_dispatch_lag_ms").record(lag_ms);
}

/// 记录交接队列深度
pub fn record_queue_len(len: usize) {
    gauge!("replay_queue_len").set(len as f64);
}

/// 记录一次分发结束
pub fn record_dispatch_finished(policy: &str, outcome: &str) {
    counter!(
        "replay_dispatch_runs_total",
        "policy" => policy.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 回放指标聚合器
///
/// 每个消费者持有一份，结束时合并。
#[derive(Debug, Clone, Default)]
pub struct ReplayMetricsAggregator {
    /// 接收的操作数
    pub total_ops: u64,

    /// 载荷总字节数
    pub total_payload_bytes: u64,

    /// 回放时间偏差统计 (毫秒，正值表示落后于原始时间线)
    pub skew_stats: RunningStats,
}

impl ReplayMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个已接收的操作
    pub fn update(&mut self, payload_len: usize, skew_ms: f64) {
        self.total_ops += 1;
        self.total_payload_bytes += payload_len as u64;
        self.skew_stats.push(skew_ms);
    }

    /// 合并另一个聚合器
    pub fn merge(&mut self, other: &Self) {
        self.total_ops += other.total_ops;
        self.total_payload_bytes += other.total_payload_bytes;
        self.skew_stats.merge(&other.skew_stats);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ops: self.total_ops,
            total_payload_bytes: self.total_payload_bytes,
            skew_ms: StatsSummary::from(&self.skew_stats),
        }
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ops: u64,
    pub total_payload_bytes: u64,
    pub skew_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Replay Metrics Summary ===")?;
        writeln!(f, "Total ops: {}", self.total_ops)?;
        writeln!(f, "Payload bytes: {}", self.total_payload_bytes)?;
        writeln!(f, "Schedule skew (ms): {}", self.skew_ms)?;
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

    /// 合并两组统计 (Chan 并行算法)
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / total as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * (self.count as f64 * other.count as f64) / total as f64;

        self.count = total;
        self.mean = mean;
        self.m2 = m2;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
