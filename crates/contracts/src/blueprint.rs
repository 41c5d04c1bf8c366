//! ReplayBlueprint - Config Loader output
//!
//! Describes a complete replay run: where the recorded operations live,
//! which delivery policy redelivers them, and how many consumers drain the
//! handoff queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Handoff queue capacity used by the best-effort policy
pub const BEST_EFFORT_QUEUE_CAPACITY: usize = 10_000;

/// Handoff queue capacity used by the time-paced policy
pub const BY_TIME_QUEUE_CAPACITY: usize = 5_000;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Recorded operation source
    pub source: SourceConfig,

    /// Delivery policy
    pub dispatch: DispatchConfig,

    /// Queue consumers
    #[serde(default)]
    pub workers: WorkersConfig,
}

/// Where recorded operations are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to a JSON-lines recording
    pub path: PathBuf,
}

/// Delivery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Preload, then deliver as fast as consumers allow
    BestEffort,
    /// Deliver with the original inter-operation gaps, scaled by speedup
    #[default]
    ByTime,
}

impl DispatchPolicy {
    /// Stable name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BestEffort => "best_effort",
            Self::ByTime => "by_time",
        }
    }

    /// Handoff queue capacity used when none is configured
    pub fn default_queue_capacity(&self) -> usize {
        match self {
            Self::BestEffort => BEST_EFFORT_QUEUE_CAPACITY,
            Self::ByTime => BY_TIME_QUEUE_CAPACITY,
        }
    }
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delivery policy
    #[serde(default)]
    pub policy: DispatchPolicy,

    /// Preload capacity (best effort) or cap on replayed operations (by time)
    #[serde(default = "default_max_ops")]
    pub max_ops: usize,

    /// Replay velocity multiplier, must be > 0 (by time only)
    #[serde(default = "default_speedup")]
    pub speedup: f64,

    /// Handoff queue capacity (None = policy default)
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

fn default_max_ops() -> usize {
    1_000_000
}

fn default_speedup() -> f64 {
    1.0
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            policy: DispatchPolicy::default(),
            max_ops: default_max_ops(),
            speedup: default_speedup(),
            queue_capacity: None,
        }
    }
}

impl DispatchConfig {
    /// Best-effort configuration with the given preload capacity
    pub fn best_effort(max_ops: usize) -> Self {
        Self {
            policy: DispatchPolicy::BestEffort,
            max_ops,
            ..Default::default()
        }
    }

    /// Time-paced configuration
    pub fn by_time(max_ops: usize, speedup: f64) -> Self {
        Self {
            policy: DispatchPolicy::ByTime,
            max_ops,
            speedup,
            queue_capacity: None,
        }
    }

    /// Queue capacity after applying the policy default
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity
            .unwrap_or_else(|| self.policy.default_queue_capacity())
    }
}

/// Consumer pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkersConfig {
    /// Number of concurrent consumers draining the handoff queue
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

fn default_worker_count() -> usize {
    8
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}
