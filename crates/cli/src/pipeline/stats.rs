//! Replay statistics and metrics.

use std::time::Duration;

use contracts::DispatchPolicy;
use dispatcher::DispatchOutcome;
use observability::ReplayMetricsAggregator;

/// Statistics from a replay run
#[derive(Debug, Clone)]
pub struct ReplayStats {
    /// Delivery policy used
    pub policy: DispatchPolicy,

    /// How the dispatch phase ended
    pub outcome: DispatchOutcome,

    /// Operations enqueued by the dispatcher
    pub ops_dispatched: u64,

    /// Operations the dispatcher had to enqueue behind schedule
    pub ops_late: u64,

    /// Number of consumers
    pub workers: usize,

    /// Total duration of the replay, preload included
    pub duration: Duration,

    /// Merged consumer metrics
    pub metrics: ReplayMetricsAggregator,
}

impl ReplayStats {
    /// Operations received by consumers
    pub fn ops_received(&self) -> u64 {
        self.metrics.total_ops
    }

    /// Received operations per second of wall time
    pub fn ops_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ops_received() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Replay Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Policy: {}", self.policy);
        println!("   ├─ Outcome: {}", self.outcome.as_str());
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ops dispatched: {}", self.ops_dispatched);
        println!("   ├─ Ops received: {}", self.ops_received());
        println!("   ├─ Ops/s: {:.2}", self.ops_per_sec());
        println!("   └─ Workers: {}", self.workers);

        let summary = self.metrics.summary();

        println!("\nConsumer Metrics");
        println!("   ├─ Payload bytes: {}", summary.total_payload_bytes);
        println!("   ├─ Late ops: {}", self.ops_late);
        println!("   └─ Schedule skew (ms): {}", summary.skew_ms);

        println!();
    }
}
