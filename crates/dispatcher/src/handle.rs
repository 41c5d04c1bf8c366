//! DispatchHandle - owns a running dispatch task and its handoff queue

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::DispatchPolicy;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::queue::HandoffQueue;

/// How a dispatch run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Source exhausted, end marker received, or op cap reached
    Completed,
    /// Stopped through the cancellation token
    Cancelled,
}

impl DispatchOutcome {
    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Terminal status of a dispatch run
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Delivery policy used
    pub policy: DispatchPolicy,
    /// Operations enqueued on the handoff queue
    pub ops_dispatched: u64,
    /// How the run ended
    pub outcome: DispatchOutcome,
    /// Wall time of the dispatch phase
    pub elapsed: Duration,
}

impl DispatchReport {
    pub(crate) fn new(
        policy: DispatchPolicy,
        ops_dispatched: u64,
        outcome: DispatchOutcome,
        elapsed: Duration,
    ) -> Self {
        let report = Self {
            policy,
            ops_dispatched,
            outcome,
            elapsed,
        };
        observability::record_dispatch_finished(policy.as_str(), outcome.as_str());
        info!(
            policy = %policy,
            dispatched = ops_dispatched,
            outcome = outcome.as_str(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Dispatching ended"
        );
        report
    }
}

/// Handle to a running dispatch task
///
/// Dropping the handle detaches the task; the queue still closes when the
/// run ends.
pub struct DispatchHandle {
    /// Delivery policy
    policy: DispatchPolicy,
    /// Consumer side of the handoff queue
    queue: HandoffQueue,
    /// Shared metrics
    metrics: Arc<DispatchMetrics>,
    /// Stops the run at its next suspension point
    cancel: CancellationToken,
    /// Dispatch task handle
    worker_handle: JoinHandle<Result<DispatchReport, DispatchError>>,
}

impl DispatchHandle {
    /// Spawn the dispatch future and wrap it in a handle
    pub(crate) fn spawn<F>(
        policy: DispatchPolicy,
        queue: HandoffQueue,
        metrics: Arc<DispatchMetrics>,
        cancel: CancellationToken,
        task: F,
    ) -> Self
    where
        F: Future<Output = Result<DispatchReport, DispatchError>> + Send + 'static,
    {
        let worker_handle = tokio::spawn(task);
        debug!(policy = %policy, "Dispatch task spawned");

        Self {
            policy,
            queue,
            metrics,
            cancel,
            worker_handle,
        }
    }

    /// Delivery policy
    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// The handoff queue; clone it once per consumer
    pub fn queue(&self) -> &HandoffQueue {
        &self.queue
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Token observed by the dispatch task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the dispatch task to stop; the queue is closed when it does
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the dispatch task has returned
    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Wait for the dispatch task and return its terminal status
    ///
    /// The handle's own queue receiver is released first, so a run whose
    /// consumers have all gone away ends with `ConsumersGone` instead of
    /// waiting on a full queue forever.
    #[instrument(name = "dispatch_handle_join", skip(self), fields(policy = %self.policy))]
    pub async fn join(self) -> Result<DispatchReport, DispatchError> {
        let Self {
            queue,
            worker_handle,
            ..
        } = self;
        drop(queue);

        match worker_handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = ?e, "Dispatch task panicked");
                Err(DispatchError::TaskFailed {
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::handoff_queue;

    #[tokio::test]
    async fn test_join_returns_report() {
        let (tx, queue) = handoff_queue(1).unwrap();
        let handle = DispatchHandle::spawn(
            DispatchPolicy::BestEffort,
            queue,
            Arc::new(DispatchMetrics::new()),
            CancellationToken::new(),
            async move {
                tx.close();
                Ok(DispatchReport::new(
                    DispatchPolicy::BestEffort,
                    0,
                    DispatchOutcome::Completed,
                    Duration::ZERO,
                ))
            },
        );

        assert_eq!(handle.policy(), DispatchPolicy::BestEffort);
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Completed);
        assert_eq!(report.ops_dispatched, 0);
    }

    fn explode() -> Result<DispatchReport, DispatchError> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_join_reports_panic() {
        let (_tx, queue) = handoff_queue(1).unwrap();
        let handle = DispatchHandle::spawn(
            DispatchPolicy::ByTime,
            queue,
            Arc::new(DispatchMetrics::new()),
            CancellationToken::new(),
            async move { explode() },
        );

        let result = handle.join().await;
        assert!(matches!(result, Err(DispatchError::TaskFailed { .. })));
    }

    #[tokio::test]
    async fn test_cancel_shares_token() {
        let (_tx, queue) = handoff_queue(1).unwrap();
        let cancel = CancellationToken::new();
        let observed = cancel.clone();
        let handle = DispatchHandle::spawn(
            DispatchPolicy::ByTime,
            queue,
            Arc::new(DispatchMetrics::new()),
            cancel,
            async move {
                observed.cancelled().await;
                Ok(DispatchReport::new(
                    DispatchPolicy::ByTime,
                    0,
                    DispatchOutcome::Cancelled,
                    Duration::ZERO,
                ))
            },
        );

        handle.cancel();
        assert!(handle.cancellation_token().is_cancelled());
        let report = handle.join().await.unwrap();
        assert_eq!(report.outcome, DispatchOutcome::Cancelled);
    }
}
