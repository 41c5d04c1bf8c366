//! Synthetic 操作源
//!
//! 用于无录制文件的测试与演示：以固定间隔生成时间戳递增的操作。

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use contracts::{ContractError, OpSource, Operation};
use tracing::trace;

/// Synthetic 操作源配置
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// 第一个操作的捕获时间
    pub start: DateTime<Utc>,

    /// 相邻操作的捕获间隔
    pub interval: Duration,

    /// 操作总数
    pub total: u64,

    /// 载荷大小 (字节)
    ///
    /// 载荷是由 `x` 填充的 JSON 字符串，最小 2 字节 (`""`)。
    pub payload_size: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH,
            interval: Duration::from_millis(10),
            total: 1_000,
            payload_size: 64,
        }
    }
}

/// `"xx..x"`，共 `size` 字节
fn padding_payload(size: usize) -> Bytes {
    let mut payload = vec![b'x'; size.max(2)];
    payload[0] = b'"';
    payload[size.max(2) - 1] = b'"';
    Bytes::from(payload)
}

/// Synthetic 操作源
pub struct SyntheticOpSource {
    config: SyntheticConfig,
    step: TimeDelta,
    payload: Bytes,
    read: u64,
}

impl SyntheticOpSource {
    /// 创建新的 Synthetic 操作源
    pub fn new(config: SyntheticConfig) -> Self {
        let step = TimeDelta::from_std(config.interval).unwrap_or(TimeDelta::MAX);
        let payload = padding_payload(config.payload_size);
        Self {
            config,
            step,
            payload,
            read: 0,
        }
    }

    /// 以固定间隔生成 `total` 个操作
    pub fn every(interval: Duration, total: u64) -> Self {
        Self::new(SyntheticConfig {
            interval,
            total,
            ..Default::default()
        })
    }

    fn timestamp_of(&self, index: u64) -> Result<DateTime<Utc>, ContractError> {
        i32::try_from(index)
            .ok()
            .and_then(|i| self.step.checked_mul(i))
            .and_then(|offset| self.config.start.checked_add_signed(offset))
            .ok_or_else(|| {
                ContractError::source_read("synthetic", format!("timestamp overflow at op {index}"))
            })
    }
}

impl OpSource for SyntheticOpSource {
    async fn next(&mut self) -> Result<Option<Operation>, ContractError> {
        if self.read >= self.config.total {
            return Ok(None);
        }

        let timestamp = self.timestamp_of(self.read)?;
        self.read += 1;
        trace!(index = self.read, %timestamp, "synthetic op generated");

        Ok(Some(Operation::new(timestamp, self.payload.clone())))
    }

    fn all_loaded(&self) -> bool {
        self.read >= self.config.total
    }

    fn ops_read(&self) -> u64 {
        self.read
    }
}
