//! TaskExecutor port - 実行の抽象化
//!
//! The core never looks inside a payload. Whatever runs it must tolerate
//! being invoked more than once for the same task (a reclaim can race a slow
//! but live execution).

use async_trait::async_trait;

use crate::domain::ExecutionError;

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// `Ok` is recorded as `Completed`, `Err` as `Failed`.
    async fn execute(&self, payload: &[u8]) -> Result<(), ExecutionError>;
}
