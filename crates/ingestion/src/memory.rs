//! 内存操作源
//!
//! 用于测试和嵌入式调用方：操作已全部在内存中。

use std::collections::VecDeque;

use contracts::{ContractError, OpSource, Operation};

/// 内存操作源
///
/// 按给定顺序逐个交出操作，交出后不再持有。
#[derive(Debug, Default)]
pub struct MemoryOpSource {
    ops: VecDeque<Operation>,
    read: u64,
}

impl MemoryOpSource {
    /// 从操作序列创建
    pub fn new(ops: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            ops: ops.into_iter().collect(),
            read: 0,
        }
    }

    /// 剩余未交出的操作数
    pub fn remaining(&self) -> usize {
        self.ops.len()
    }
}

impl OpSource for MemoryOpSource {
    async fn next(&mut self) -> Result<Option<Operation>, ContractError> {
        let op = self.ops.pop_front();
        if op.is_some() {
            self.read += 1;
        }
        Ok(op)
    }

    fn all_loaded(&self) -> bool {
        self.ops.is_empty()
    }

    fn ops_read(&self) -> u64 {
        self.read
    }
}
