//! # Ingestion
//!
//! Recorded operation sources.
//!
//! Responsibilities:
//! - Read recorded operations in capture order
//! - Implement the `OpSource` contract consumed by the dispatchers
//! - Write recordings back out as JSON lines
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::JsonlOpSource;
//! use dispatcher::BestEffortDispatcher;
//!
//! let source = JsonlOpSource::open("ops.jsonl").await?;
//! let handle = BestEffortDispatcher::new(100_000).start(source).await?;
//! while let Some(op) = handle.queue().recv().await {
//!     // Execute op against the target
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::SyntheticOpSource;
//!
//! let source = SyntheticOpSource::every(Duration::from_millis(10), 1_000);
//! ```

mod jsonl;
mod memory;
mod synthetic;

// Re-exports
pub use contracts::{OpSource, Operation};
pub use jsonl::{JsonlOpSource, JsonlOpWriter, OpRecord};
pub use memory::MemoryOpSource;
pub use synthetic::{SyntheticConfig, SyntheticOpSource};
