//! Replay orchestrator - coordinates the recording, the dispatcher and the
//! consumer pool.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{OpSource, ReplayBlueprint};
use dispatcher::{DispatcherBuilder, HandoffQueue};
use ingestion::JsonlOpSource;
use observability::ReplayMetricsAggregator;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::ReplayStats;
use crate::error::{CliError, Result};

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// The validated replay blueprint
    pub blueprint: ReplayBlueprint,

    /// Cancel the replay after this long (None = no timeout)
    pub timeout: Option<Duration>,
}

/// Main replay orchestrator
pub struct ReplayPipeline {
    config: ReplayConfig,
}

impl ReplayPipeline {
    /// Create a new replay with the given configuration
    pub fn new(config: ReplayConfig) -> Self {
        Self { config }
    }

    /// Open the configured recording and replay it to completion
    pub async fn run(self, cancel: CancellationToken) -> Result<ReplayStats> {
        let path = self.config.blueprint.source.path.clone();
        info!(path = %path.display(), "Opening recording");
        let source = JsonlOpSource::open(&path).await?;

        self.run_with_source(source, cancel).await
    }

    /// Replay logic shared by every source kind
    pub async fn run_with_source<S>(self, source: S, cancel: CancellationToken) -> Result<ReplayStats>
    where
        S: OpSource + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // 函数返回 (包括提前返回) 时结束超时任务
        let finished = CancellationToken::new();
        let _finished_guard = finished.clone().drop_guard();
        if let Some(timeout) = self.config.timeout {
            tokio::spawn(cancel_after(timeout, cancel.clone(), finished));
        }

        let handle = DispatcherBuilder::new(blueprint.dispatch.clone())
            .with_cancellation(cancel)
            .start(source)
            .await?;

        let worker_count = blueprint.workers.count;
        let clock = Arc::new(ReplayClock::new(blueprint.dispatch.speedup));
        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(consume(
                worker_id,
                handle.queue().clone(),
                Arc::clone(&clock),
            ));
        }
        info!(workers = worker_count, policy = %handle.policy(), "Replay running");

        let dispatch_metrics = Arc::clone(handle.metrics());
        let report = handle.join().await;

        let mut metrics = ReplayMetricsAggregator::new();
        let mut consumer_failure = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_metrics) => metrics.merge(&worker_metrics),
                Err(e) => {
                    error!(error = %e, "Consumer task failed");
                    if consumer_failure.is_none() {
                        consumer_failure = Some(e.to_string());
                    }
                }
            }
        }
        let report = report?;
        if let Some(message) = consumer_failure {
            warn!(
                outcome = report.outcome.as_str(),
                ops_dispatched = report.ops_dispatched,
                ops_received = metrics.total_ops,
                "Replay ended with a failed consumer"
            );
            return Err(CliError::consumer(message));
        }

        let stats = ReplayStats {
            policy: report.policy,
            outcome: report.outcome,
            ops_dispatched: report.ops_dispatched,
            ops_late: dispatch_metrics.late_count(),
            workers: worker_count,
            duration: start_time.elapsed(),
            metrics,
        };

        info!(
            ops = stats.ops_received(),
            duration_secs = stats.duration.as_secs_f64(),
            ops_per_sec = format!("{:.2}", stats.ops_per_sec()),
            "Replay finished"
        );

        Ok(stats)
    }
}

/// Cancel the replay once `timeout` elapses, unless the replay finishes first
async fn cancel_after(timeout: Duration, cancel: CancellationToken, finished: CancellationToken) {
    tokio::select! {
        _ = finished.cancelled() => {}
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "Replay timed out, cancelling");
            cancel.cancel();
        }
    }
}

/// Reference point for consumer-side schedule skew
///
/// Anchored at the first operation any consumer receives.
struct ReplayClock {
    speedup: f64,
    anchor: OnceLock<(DateTime<Utc>, Instant)>,
}

impl ReplayClock {
    fn new(speedup: f64) -> Self {
        Self {
            speedup,
            anchor: OnceLock::new(),
        }
    }

    /// Milliseconds behind (positive) or ahead of (negative) the scaled
    /// original timeline
    fn skew_ms(&self, timestamp: DateTime<Utc>, now: Instant) -> f64 {
        let &(anchor_ts, anchor_wall) = self.anchor.get_or_init(|| (timestamp, now));

        let expected_ms = (timestamp - anchor_ts)
            .num_microseconds()
            .map_or(0.0, |us| us as f64 / 1_000.0)
            / self.speedup;
        let actual_ms = now.saturating_duration_since(anchor_wall).as_secs_f64() * 1_000.0;

        actual_ms - expected_ms
    }
}

/// Drain the handoff queue until it is closed
async fn consume(
    worker_id: usize,
    queue: HandoffQueue,
    clock: Arc<ReplayClock>,
) -> ReplayMetricsAggregator {
    let mut metrics = ReplayMetricsAggregator::new();

    while let Some(op) = queue.recv().await {
        let skew_ms = clock.skew_ms(op.timestamp, Instant::now());
        metrics.update(op.payload_len(), skew_ms);
        trace!(worker_id, ts = %op.timestamp, skew_ms, "Operation received");
    }

    debug!(worker_id, ops = metrics.total_ops, "Consumer finished");
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use contracts::{ConfigVersion, DispatchConfig, Operation, SourceConfig, WorkersConfig};
    use dispatcher::DispatchOutcome;
    use ingestion::MemoryOpSource;

    fn config(dispatch: DispatchConfig, workers: usize) -> ReplayConfig {
        ReplayConfig {
            blueprint: ReplayBlueprint {
                version: ConfigVersion::V1,
                source: SourceConfig {
                    path: "unused.jsonl".into(),
                },
                dispatch,
                workers: WorkersConfig { count: workers },
            },
            timeout: None,
        }
    }

    fn source(n: i64, step_ms: i64) -> MemoryOpSource {
        let t0 = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        MemoryOpSource::new(
            (0..n).map(|i| Operation::new(t0 + TimeDelta::milliseconds(i * step_ms), vec![0u8; 4])),
        )
    }

    #[tokio::test]
    async fn test_best_effort_replay_delivers_everything() {
        let pipeline = ReplayPipeline::new(config(DispatchConfig::best_effort(100), 4));
        let stats = pipeline
            .run_with_source(source(50, 10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.ops_dispatched, 50);
        assert_eq!(stats.ops_received(), 50);
        assert_eq!(stats.metrics.total_payload_bytes, 200);
        assert_eq!(stats.outcome, DispatchOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_paced_replay() {
        let mut cfg = config(DispatchConfig::by_time(100, 1.0), 2);
        cfg.timeout = Some(Duration::from_secs(5));

        // one op per second: only the first few fit in the timeout
        let stats = ReplayPipeline::new(cfg)
            .run_with_source(source(100, 1_000), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.outcome, DispatchOutcome::Cancelled);
        assert!(stats.ops_received() < 100);
        assert_eq!(stats.ops_received(), stats.ops_dispatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_outlive_failed_start() {
        let mut cfg = config(DispatchConfig::by_time(10, 0.0), 1);
        cfg.timeout = Some(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let result = ReplayPipeline::new(cfg)
            .run_with_source(source(3, 1), cancel.clone())
            .await;
        assert!(matches!(result, Err(CliError::Dispatch(_))));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_does_not_outlive_finished_replay() {
        let mut cfg = config(DispatchConfig::best_effort(10), 2);
        cfg.timeout = Some(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let stats = ReplayPipeline::new(cfg)
            .run_with_source(source(3, 1), cancel.clone())
            .await
            .unwrap();
        assert_eq!(stats.outcome, DispatchOutcome::Completed);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_invalid_dispatch_config_surfaces() {
        let pipeline = ReplayPipeline::new(config(DispatchConfig::by_time(10, -1.0), 1));
        let result = pipeline
            .run_with_source(source(3, 1), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CliError::Dispatch(_))));
    }

    #[test]
    fn test_clock_skew_sign() {
        let clock = ReplayClock::new(2.0);
        let t0 = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let wall = Instant::now();

        assert_eq!(clock.skew_ms(t0, wall), 0.0);
        // due 500ms after the anchor, received after 800ms
        let skew = clock.skew_ms(t0 + TimeDelta::seconds(1), wall + Duration::from_millis(800));
        assert!((skew - 300.0).abs() < 1e-6);
    }
}
