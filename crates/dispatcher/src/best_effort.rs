//! Best-effort dispatcher - preload then drain without pacing
//!
//! The preload phase runs on the caller's task and completes before `start`
//! returns. The drain phase runs on a spawned task and only ever waits on
//! queue backpressure.

use std::collections::VecDeque;
use std::sync::Arc;

use contracts::{BEST_EFFORT_QUEUE_CAPACITY, DispatchPolicy, OpSource, Operation};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatchError;
use crate::handle::{DispatchHandle, DispatchOutcome, DispatchReport};
use crate::metrics::DispatchMetrics;
use crate::progress::ProgressReporter;
use crate::queue::{PushOutcome, QueueSender, handoff_queue};

/// Preload progress is logged every this many operations
pub const PRELOAD_REPORT_INTERVAL: u64 = 30_000;

/// Upper bound on the up-front buffer reservation
const PRELOAD_RESERVE_LIMIT: usize = 1 << 16;

/// Preloads up to `capacity` operations, then streams them as fast as the
/// queue accepts them
#[derive(Debug, Clone)]
pub struct BestEffortDispatcher {
    capacity: u64,
    queue_capacity: usize,
    cancel: CancellationToken,
}

impl BestEffortDispatcher {
    /// Create a dispatcher that preloads at most `capacity` operations
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            queue_capacity: BEST_EFFORT_QUEUE_CAPACITY,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the handoff queue capacity
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Observe an external cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Preload from `source`, then spawn the drain task
    ///
    /// # Errors
    /// A zero queue capacity, or a source error during preload. Nothing is
    /// spawned in either case.
    #[instrument(
        name = "best_effort_start",
        skip(self, source),
        fields(capacity = self.capacity, queue_capacity = self.queue_capacity)
    )]
    pub async fn start<S: OpSource>(self, mut source: S) -> Result<DispatchHandle, DispatchError> {
        let (tx, queue) = handoff_queue(self.queue_capacity)?;
        let metrics = Arc::new(DispatchMetrics::new());

        let buffer = self.preload(&mut source, &metrics).await?;
        drop(source);

        let drain_metrics = Arc::clone(&metrics);
        let cancel = self.cancel.clone();
        Ok(DispatchHandle::spawn(
            DispatchPolicy::BestEffort,
            queue,
            metrics,
            self.cancel,
            drain(buffer, tx, drain_metrics, cancel),
        ))
    }

    async fn preload<S: OpSource>(
        &self,
        source: &mut S,
        metrics: &DispatchMetrics,
    ) -> Result<VecDeque<Operation>, DispatchError> {
        let reserve = usize::try_from(self.capacity)
            .unwrap_or(usize::MAX)
            .min(PRELOAD_RESERVE_LIMIT);
        let mut buffer = VecDeque::with_capacity(reserve);
        let progress = ProgressReporter::start("preload");

        info!("Start preloading");
        for i in 0..self.capacity {
            if source.all_loaded() {
                break;
            }
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(preloaded = buffer.len(), "Preload cancelled");
                    break;
                }
                next = source.next() => next?,
            };
            let Some(op) = next else {
                break;
            };

            buffer.push_back(op);
            metrics.inc_preloaded_count();
            observability::record_op_preloaded();

            if i != 0 && i % PRELOAD_REPORT_INTERVAL == 0 {
                progress.report(source.ops_read());
                metrics.inc_progress_reports();
            }
        }
        progress.report(source.ops_read());
        metrics.inc_progress_reports();
        info!(preloaded = buffer.len(), "Preloading finished");

        Ok(buffer)
    }
}

/// Push every buffered operation in order, then close the queue
async fn drain(
    mut buffer: VecDeque<Operation>,
    tx: QueueSender,
    metrics: Arc<DispatchMetrics>,
    cancel: CancellationToken,
) -> Result<DispatchReport, DispatchError> {
    let policy = DispatchPolicy::BestEffort;
    let progress = ProgressReporter::start("dispatch");
    let mut dispatched: u64 = 0;
    let mut outcome = DispatchOutcome::Completed;

    info!(buffered = buffer.len(), "Start dispatching");
    while let Some(op) = buffer.pop_front() {
        match tx.push(op, &cancel).await {
            PushOutcome::Delivered => {
                dispatched += 1;
                metrics.inc_dispatched_count();
                metrics.set_queue_len(tx.len());
                observability::record_op_dispatched(policy.as_str());
                observability::record_queue_len(tx.len());
            }
            PushOutcome::Cancelled => {
                outcome = DispatchOutcome::Cancelled;
                break;
            }
            PushOutcome::Disconnected => {
                warn!(dispatched, remaining = buffer.len(), "Handoff queue has no consumers");
                tx.close();
                return Err(DispatchError::ConsumersGone { dispatched });
            }
        }
    }
    tx.close();
    progress.report(dispatched);
    metrics.inc_progress_reports();

    Ok(DispatchReport::new(
        policy,
        dispatched,
        outcome,
        progress.elapsed(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use contracts::ContractError;
    use ingestion::MemoryOpSource;

    fn ops(n: i64) -> Vec<Operation> {
        let t0 = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        (0..n)
            .map(|i| Operation::new(t0 + TimeDelta::seconds(i), vec![i as u8]))
            .collect()
    }

    async fn collect(handle: &DispatchHandle) -> Vec<u8> {
        let mut seen = Vec::new();
        while let Some(op) = handle.queue().recv().await {
            seen.push(op.payload[0]);
        }
        seen
    }

    #[tokio::test]
    async fn test_capacity_larger_than_source() {
        let handle = BestEffortDispatcher::new(5)
            .start(MemoryOpSource::new(ops(3)))
            .await
            .unwrap();

        assert_eq!(collect(&handle).await, vec![0, 1, 2]);
        assert!(handle.queue().is_closed());

        let report = handle.join().await.unwrap();
        assert_eq!(report.ops_dispatched, 3);
        assert_eq!(report.outcome, DispatchOutcome::Completed);
    }

    #[tokio::test]
    async fn test_capacity_smaller_than_source() {
        let source = MemoryOpSource::new(ops(10));
        let handle = BestEffortDispatcher::new(4).start(source).await.unwrap();

        assert_eq!(handle.metrics().preloaded_count(), 4);
        assert_eq!(collect(&handle).await, vec![0, 1, 2, 3]);
        assert_eq!(handle.join().await.unwrap().ops_dispatched, 4);
    }

    /// Preload snapshot count (periodic + final) for a source of `n` ops
    async fn preload_reports(n: i64) -> u64 {
        let handle = BestEffortDispatcher::new(n as u64)
            .with_queue_capacity(1)
            .start(MemoryOpSource::new(ops(n)))
            .await
            .unwrap();
        let reports = handle.metrics().progress_reports();
        assert_eq!(handle.metrics().preloaded_count(), n as u64);

        handle.cancel();
        handle.join().await.unwrap();
        reports
    }

    #[tokio::test]
    async fn test_preload_reports_every_interval_after_first_op() {
        // index 0 never reports; index 30,000 is the 30,001st op
        assert_eq!(preload_reports(PRELOAD_REPORT_INTERVAL as i64).await, 1);
        assert_eq!(preload_reports(PRELOAD_REPORT_INTERVAL as i64 + 1).await, 2);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_empty_replay() {
        let handle = BestEffortDispatcher::new(0)
            .start(MemoryOpSource::new(ops(3)))
            .await
            .unwrap();

        assert!(handle.queue().recv().await.is_none());
        assert_eq!(handle.join().await.unwrap().ops_dispatched, 0);
    }

    #[tokio::test]
    async fn test_order_preserved_through_small_queue() {
        let handle = BestEffortDispatcher::new(200)
            .with_queue_capacity(2)
            .start(MemoryOpSource::new(ops(200)))
            .await
            .unwrap();

        let seen = collect(&handle).await;
        let expected: Vec<u8> = (0..200).map(|i| i as u8).collect();
        assert_eq!(seen, expected);
        assert_eq!(handle.metrics().dispatched_count(), 200);
    }

    #[tokio::test]
    async fn test_zero_queue_capacity_rejected() {
        let result = BestEffortDispatcher::new(5)
            .with_queue_capacity(0)
            .start(MemoryOpSource::new(ops(3)))
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_cancel_stops_drain() {
        let handle = BestEffortDispatcher::new(10)
            .with_queue_capacity(1)
            .start(MemoryOpSource::new(ops(10)))
            .await
            .unwrap();

        let first = handle.queue().recv().await.unwrap();
        assert_eq!(first.payload[0], 0);
        handle.cancel();

        let queue = handle.queue().clone();
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Cancelled);
        assert!(report.ops_dispatched < 10);

        // whatever was enqueued before the cancel is still delivered
        while queue.recv().await.is_some() {}
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_consumers_gone() {
        let handle = BestEffortDispatcher::new(10)
            .with_queue_capacity(1)
            .start(MemoryOpSource::new(ops(10)))
            .await
            .unwrap();

        let result = handle.join().await;
        assert!(matches!(result, Err(DispatchError::ConsumersGone { .. })));
    }

    struct FailingSource {
        read: u64,
    }

    impl OpSource for FailingSource {
        async fn next(&mut self) -> Result<Option<Operation>, ContractError> {
            self.read += 1;
            Err(ContractError::op_decode(self.read, "bad line"))
        }

        fn all_loaded(&self) -> bool {
            false
        }

        fn ops_read(&self) -> u64 {
            self.read
        }
    }

    #[tokio::test]
    async fn test_preload_error_returned_synchronously() {
        let result = BestEffortDispatcher::new(5)
            .start(FailingSource { read: 0 })
            .await;
        assert!(matches!(result, Err(DispatchError::Source(_))));
    }
}
