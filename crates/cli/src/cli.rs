//! CLI argument definitions using clap.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use contracts::DispatchPolicy;
use std::path::PathBuf;

/// Replay - redeliver recorded operations to concurrent consumers
#[derive(Parser, Debug)]
#[command(
    name = "replay",
    author,
    version,
    about = "Traffic replay scheduler",
    long_about = "Replays a recording of timestamped operations through a bounded handoff queue.\n\n\
                  Operations are delivered either as fast as consumers allow (best_effort) or \n\
                  with their original spacing scaled by a speedup factor (by_time)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "REPLAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "REPLAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recording
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Write a synthetic recording
    Generate(GenerateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "replay.toml", env = "REPLAY_CONFIG")]
    pub config: PathBuf,

    /// Override the recording path from configuration
    #[arg(long, env = "REPLAY_SOURCE")]
    pub source: Option<PathBuf>,

    /// Override the delivery policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Override the speedup factor (by_time only)
    #[arg(long, env = "REPLAY_SPEEDUP")]
    pub speedup: Option<f64>,

    /// Override the preload capacity / op cap
    #[arg(long, env = "REPLAY_MAX_OPS")]
    pub max_ops: Option<usize>,

    /// Override the number of consumers
    #[arg(long, env = "REPLAY_WORKERS")]
    pub workers: Option<usize>,

    /// Override the handoff queue capacity
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Cancel the replay after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "REPLAY_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without replaying
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "REPLAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "replay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "replay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `generate` command
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Output recording path
    #[arg(short, long, default_value = "ops.jsonl")]
    pub output: PathBuf,

    /// Number of operations to write
    #[arg(long, default_value = "1000")]
    pub count: u64,

    /// Capture interval between operations, in milliseconds
    #[arg(long, default_value = "10")]
    pub interval_ms: u64,

    /// Payload size in bytes (a padded JSON string, at least 2)
    #[arg(long, default_value = "64")]
    pub payload_size: usize,

    /// Capture time of the first operation (RFC 3339, default: now)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
}

/// Delivery policy as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    /// Preload, then deliver as fast as possible
    BestEffort,
    /// Deliver with original spacing scaled by speedup
    ByTime,
}

impl From<PolicyArg> for DispatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::BestEffort => DispatchPolicy::BestEffort,
            PolicyArg::ByTime => DispatchPolicy::ByTime,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl RunArgs {
    /// Prometheus exporter port, if enabled
    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port != 0).then_some(self.metrics_port)
    }
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
