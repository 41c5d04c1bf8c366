//! # Dispatcher
//!
//! 操作重放调度模块。
//!
//! 负责：
//! - 从 `OpSource` 拉取录制的操作
//! - 按策略 (best-effort / by-time) 推入有界 handoff 队列
//! - 关闭队列作为唯一的结束信号，并通过 `DispatchHandle` 报告终态

mod best_effort;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
mod paced;
pub mod progress;
pub mod queue;

pub use best_effort::{BestEffortDispatcher, PRELOAD_REPORT_INTERVAL};
pub use contracts::{DispatchConfig, DispatchPolicy, OpSource, Operation};
pub use dispatcher::{DispatcherBuilder, create_dispatcher};
pub use error::DispatchError;
pub use handle::{DispatchHandle, DispatchOutcome, DispatchReport};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use paced::{PACED_REPORT_INTERVAL, TimePacedDispatcher};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use queue::HandoffQueue;
