//! OpSource trait - ordered operation source abstraction
//!
//! Decouples the dispatchers from how operations are stored and decoded.
//! File-backed recordings, in-memory fixtures and synthetic generators all
//! implement the same interface.

use crate::{ContractError, Operation};

/// Ordered source of recorded operations
///
/// Operations must be yielded in original capture order. The dispatchers
/// never reorder what they receive.
///
/// # Example
///
/// ```ignore
/// let mut source = MemoryOpSource::new(ops);
/// while !source.all_loaded() {
///     let Some(op) = source.next().await? else { break };
///     // ... forward op ...
/// }
/// ```
#[trait_variant::make(OpSource: Send)]
pub trait LocalOpSource {
    /// Yield the next operation
    ///
    /// `Ok(None)` is the end marker: no further operations will follow.
    ///
    /// # Errors
    /// Returns decode or IO errors from the underlying storage
    async fn next(&mut self) -> Result<Option<Operation>, ContractError>;

    /// True once no further operations will ever be produced
    fn all_loaded(&self) -> bool;

    /// Number of operations yielded so far (reporting only)
    fn ops_read(&self) -> u64;
}
