//! Operation - the unit of replay
//!
//! One recorded request, stamped with the instant it was captured.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded operation
///
/// The payload is opaque to the replay core: it is forwarded untouched from
/// the source to whichever consumer pulls the operation off the handoff queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Original capture timestamp
    pub timestamp: DateTime<Utc>,

    /// Encoded request body (zero-copy)
    pub payload: Bytes,
}

impl Operation {
    /// Create a new operation
    pub fn new(timestamp: DateTime<Utc>, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
        }
    }

    /// Payload size in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_new() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let op = Operation::new(ts, &b"find"[..]);
        assert_eq!(op.timestamp, ts);
        assert_eq!(op.payload_len(), 4);
    }

    #[test]
    fn test_operation_clone_shares_payload() {
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        let op = Operation::new(ts, vec![1u8; 64]);
        let copy = op.clone();
        assert_eq!(op, copy);
        assert_eq!(op.payload.as_ptr(), copy.payload.as_ptr());
    }
}
