//! # Contracts
//!
//! Frozen interface contracts shared by every replay crate: the recorded
//! `Operation`, the `OpSource` capability the dispatchers pull from, the
//! replay configuration blueprint and the layered error type.
//! Business crates depend on this crate only, never on each other in reverse.
//!
//! ## Time Model
//! - Every operation carries its original capture instant (`DateTime<Utc>`)
//! - Pacing works on offsets from the first dispatched operation, never on
//!   absolute timestamps

mod blueprint;
mod error;
mod op_source;
mod operation;

pub use blueprint::*;
pub use error::*;
pub use op_source::{LocalOpSource, OpSource};
pub use operation::Operation;
