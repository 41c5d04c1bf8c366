//! Handoff queue - bounded single-producer / multi-consumer channel of operations
//!
//! Closing the queue is the only end-of-stream signal consumers get.

use async_channel::{bounded, Receiver, Sender};
use contracts::Operation;
use tokio_util::sync::CancellationToken;

use crate::error::DispatchError;

/// Consumer side of the handoff queue
///
/// Cheap to clone: every clone pulls from the same FIFO, and each operation
/// is delivered to exactly one consumer.
#[derive(Debug, Clone)]
pub struct HandoffQueue {
    rx: Receiver<Operation>,
}

impl HandoffQueue {
    /// Receive the next operation
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<Operation> {
        self.rx.recv().await.ok()
    }

    /// Receive without waiting
    pub fn try_recv(&self) -> Option<Operation> {
        self.rx.try_recv().ok()
    }

    /// True once the producer has closed the queue
    ///
    /// Operations enqueued before closing may still be pending.
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Operations currently buffered
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }
}

/// Result of a single push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// Enqueued
    Delivered,
    /// Cancellation fired while waiting for room
    Cancelled,
    /// Every consumer is gone
    Disconnected,
}

/// Producer side of the handoff queue, owned by the dispatch task
#[derive(Debug)]
pub(crate) struct QueueSender {
    tx: Sender<Operation>,
}

impl QueueSender {
    /// Push an operation, waiting while the queue is full
    pub(crate) async fn push(&self, op: Operation, cancel: &CancellationToken) -> PushOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => PushOutcome::Cancelled,
            sent = self.tx.send(op) => match sent {
                Ok(()) => PushOutcome::Delivered,
                Err(_) => PushOutcome::Disconnected,
            },
        }
    }

    /// Operations currently buffered
    pub(crate) fn len(&self) -> usize {
        self.tx.len()
    }

    /// Close the queue
    ///
    /// Consumes the sender, so a run can close its queue only once.
    pub(crate) fn close(self) {
        self.tx.close();
    }
}

/// Create a handoff queue
///
/// # Errors
/// A zero capacity is rejected: the queue must be able to hold one operation.
pub(crate) fn handoff_queue(capacity: usize) -> Result<(QueueSender, HandoffQueue), DispatchError> {
    if capacity == 0 {
        return Err(DispatchError::invalid_config(
            "queue_capacity",
            "queue capacity must be >= 1",
        ));
    }
    let (tx, rx) = bounded(capacity);
    Ok((QueueSender { tx }, HandoffQueue { rx }))
}
