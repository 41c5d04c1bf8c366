//! Time-paced dispatcher - replays operations on their original timeline
//!
//! Each operation is held until `wall_epoch + (op.timestamp - ts_epoch) / speedup`.
//! Operations already behind that deadline are enqueued immediately; the
//! dispatcher never bursts to catch up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{BY_TIME_QUEUE_CAPACITY, DispatchPolicy, OpSource};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

use crate::error::DispatchError;
use crate::handle::{DispatchHandle, DispatchOutcome, DispatchReport};
use crate::metrics::DispatchMetrics;
use crate::progress::ProgressReporter;
use crate::queue::{PushOutcome, QueueSender, handoff_queue};

/// The latest dispatched timestamp is logged every this many source reads
pub const PACED_REPORT_INTERVAL: u64 = 10_000;

/// Cap for scaled offsets that do not fit a `Duration` (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Streams operations from the source, spaced by their original gaps
/// divided by `speedup`
#[derive(Debug, Clone)]
pub struct TimePacedDispatcher {
    max_ops: u64,
    speedup: f64,
    queue_capacity: usize,
    cancel: CancellationToken,
}

impl TimePacedDispatcher {
    /// Create a dispatcher replaying at most `max_ops` operations
    pub fn new(max_ops: u64, speedup: f64) -> Self {
        Self {
            max_ops,
            speedup,
            queue_capacity: BY_TIME_QUEUE_CAPACITY,
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

    /// Spawn the dispatch task and return immediately
    ///
    /// # Errors
    /// A speedup that is not a finite value above zero, or a zero queue
    /// capacity. Nothing is spawned in either case.
    #[instrument(
        name = "time_paced_start",
        skip(self, source),
        fields(max_ops = self.max_ops, speedup = self.speedup)
    )]
    pub fn start<S>(self, source: S) -> Result<DispatchHandle, DispatchError>
    where
        S: OpSource + 'static,
    {
        validate_speedup(self.speedup)?;
        let (tx, queue) = handoff_queue(self.queue_capacity)?;
        let metrics = Arc::new(DispatchMetrics::new());

        let run = PacedRun {
            max_ops: self.max_ops,
            session: PacingSession::new(self.speedup),
            metrics: Arc::clone(&metrics),
            cancel: self.cancel.clone(),
        };
        Ok(DispatchHandle::spawn(
            DispatchPolicy::ByTime,
            queue,
            metrics,
            self.cancel,
            run.run(source, tx),
        ))
    }
}

fn validate_speedup(speedup: f64) -> Result<(), DispatchError> {
    if speedup.is_finite() && speedup > 0.0 {
        Ok(())
    } else {
        Err(DispatchError::invalid_config(
            "speedup",
            format!("speedup must be a finite value > 0, got {speedup}"),
        ))
    }
}

/// Pacing reference captured at the first operation
#[derive(Debug, Clone, Copy)]
struct Anchor {
    timestamp: DateTime<Utc>,
    wall: Instant,
}

/// Per-run pacing state
#[derive(Debug)]
struct PacingSession {
    speedup: f64,
    anchor: Option<Anchor>,
}

impl PacingSession {
    fn new(speedup: f64) -> Self {
        Self {
            speedup,
            anchor: None,
        }
    }

    /// Wall-clock instant at which an op captured at `timestamp` is due
    ///
    /// The first call anchors the session at (`timestamp`, `now`).
    fn deadline(&mut self, timestamp: DateTime<Utc>, now: Instant) -> Instant {
        let anchor = *self.anchor.get_or_insert(Anchor {
            timestamp,
            wall: now,
        });

        // out-of-order capture data is due immediately
        let offset = (timestamp - anchor.timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let scaled = Duration::try_from_secs_f64(offset.as_secs_f64() / self.speedup)
            .unwrap_or(FAR_FUTURE)
            .min(FAR_FUTURE);

        anchor.wall + scaled
    }
}

struct PacedRun {
    max_ops: u64,
    session: PacingSession,
    metrics: Arc<DispatchMetrics>,
    cancel: CancellationToken,
}

impl PacedRun {
    async fn run<S: OpSource>(
        mut self,
        mut source: S,
        tx: QueueSender,
    ) -> Result<DispatchReport, DispatchError> {
        let policy = DispatchPolicy::ByTime;
        let progress = ProgressReporter::start("dispatch");
        let mut dispatched: u64 = 0;
        let mut outcome = DispatchOutcome::Completed;

        info!(max_ops = self.max_ops, "Start dispatching");
        for _ in 0..self.max_ops {
            if source.all_loaded() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    outcome = DispatchOutcome::Cancelled;
                    break;
                }
                next = source.next() => next,
            };
            let op = match next {
                Ok(Some(op)) => op,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, dispatched, "Operation source failed");
                    tx.close();
                    return Err(e.into());
                }
            };

            let now = Instant::now();
            let deadline = self.session.deadline(op.timestamp, now);
            if deadline > now {
                trace!(wait_ms = (deadline - now).as_millis() as u64, "Pacing");
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        outcome = DispatchOutcome::Cancelled;
                        break;
                    }
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            } else if now > deadline {
                let lag = now - deadline;
                self.metrics.inc_late_count();
                observability::record_dispatch_lag_ms(lag.as_secs_f64() * 1_000.0);
            }

            let timestamp = op.timestamp;
            match tx.push(op, &self.cancel).await {
                PushOutcome::Delivered => {
                    dispatched += 1;
                    self.metrics.inc_dispatched_count();
                    self.metrics.set_queue_len(tx.len());
                    observability::record_op_dispatched(policy.as_str());
                    observability::record_queue_len(tx.len());
                }
                PushOutcome::Cancelled => {
                    outcome = DispatchOutcome::Cancelled;
                    break;
                }
                PushOutcome::Disconnected => {
                    warn!(dispatched, "Handoff queue has no consumers");
                    tx.close();
                    return Err(DispatchError::ConsumersGone { dispatched });
                }
            }

            let read = source.ops_read();
            if read % PACED_REPORT_INTERVAL == 0 {
                progress.report(read);
                self.metrics.inc_progress_reports();
                info!(latest = %timestamp, "Dispatched up to {}", timestamp);
            }
        }
        tx.close();

        Ok(DispatchReport::new(
            policy,
            dispatched,
            outcome,
            progress.elapsed(),
        ))
    }
}
