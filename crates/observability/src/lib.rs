//! # Observability
//!
//! 回放进程的日志与指标出口。
//!
//! - `tracing` 订阅器：JSON / Pretty / Compact 三种输出，`RUST_LOG` 优先
//! - 未设置 `RUST_LOG` 时只放开回放相关 crate 的日志，依赖库保持 `warn`
//! - 可选的 Prometheus 导出 (`replay run --metrics-port`)
//! - `metrics` 模块：分发器计数器与消费端偏差统计
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     log_level: "debug".into(),
//!     metrics_port: Some(9100),
//! })?;
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

// Re-exports
pub use crate::metrics::{
    record_dispatch_finished, record_dispatch_lag_ms, record_op_dispatched, record_op_preloaded,
    record_queue_len, MetricsSummary, ReplayMetricsAggregator, RunningStats, StatsSummary,
};

/// 日志级别作用的 crate (target 名)
const REPLAY_TARGETS: &[&str] = &[
    "replay",
    "replay_cli",
    "contracts",
    "config_loader",
    "ingestion",
    "dispatcher",
    "observability",
];

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// 回放 crate 的日志级别 (`RUST_LOG` 未设置时生效)
    pub log_level: String,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// `RUST_LOG` 缺省时的过滤指令
///
/// 依赖库 (tokio, hyper 等) 固定为 `warn`，回放 crate 使用 `level`。
pub fn default_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in REPLAY_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// 初始化 tracing，并在配置了端口时安装 Prometheus 导出器
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level))
            .with_context(|| format!("Invalid log level: {}", config.log_level))?,
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .with_context(|| format!("Failed to install Prometheus exporter on port {port}"))?;
        tracing::info!(port, "Prometheus metrics endpoint listening");
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_replay_crates() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("dispatcher=debug"));
        assert!(directives.contains("replay_cli=debug"));
        assert!(!directives.contains("tokio"));
    }

    #[test]
    fn test_default_directives_parse() {
        for level in ["trace", "debug", "info", "warn"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok());
        }
    }
}
