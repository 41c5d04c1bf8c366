//! Throughput reporting shared by both dispatchers

use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

/// Periodic throughput reporter
///
/// Anchored to the wall-clock instant the reporter was started.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    phase: &'static str,
    epoch: Instant,
}

impl ProgressReporter {
    /// Start measuring from now
    pub fn start(phase: &'static str) -> Self {
        Self {
            phase,
            epoch: Instant::now(),
        }
    }

    /// Wall time since start
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Throughput snapshot for `ops` processed so far
    pub fn snapshot(&self, ops: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            ops,
            elapsed: self.elapsed(),
        }
    }

    /// Take a snapshot and log it
    pub fn report(&self, ops: u64) -> ProgressSnapshot {
        let snapshot = self.snapshot(ops);
        info!(
            phase = self.phase,
            ops = snapshot.ops,
            ops_per_sec = format!("{:.2}", snapshot.ops_per_sec()),
            "{} ops processed",
            snapshot.ops
        );
        snapshot
    }
}

/// Point-in-time throughput
#[derive(Debug, Clone, Copy)]
pub struct ProgressSnapshot {
    pub ops: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Operations per second of wall time
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ops as f64 / secs
        } else {
            0.0
        }
    }
}
