//! TaskStore port - 正本（source of truth）
//!
//! All mutual-exclusion logic lives behind this trait. Callers never read a
//! record and then decide to update it; every status change is a single
//! store operation that checks and writes atomically.
//!
//! # 設計原則
//! - claim: `PENDING` かつ due の行だけを 1 トランザクションで `RUNNING` にする
//!   （他の claim がロック中の行は待たずに飛ばす）
//! - writeback: 自分の claim（`picked_at`）がまだ有効な `RUNNING` の行だけを終端状態にする
//! - reset_stale: liveness window を過ぎた `RUNNING` を `PENDING` に戻す
//! - どの操作もロックを実行中に保持しない

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::status::StatusCounts;
use crate::domain::{NewTask, StoreResult, TaskId, TaskRecord, TaskStatus};

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new `Pending` record and return its id.
    async fn submit(&self, task: NewTask) -> StoreResult<TaskId>;

    /// Claim up to `limit` due records.
    ///
    /// Returned records are already `Running` with `picked_at` set to the
    /// claim time, ordered by `due_at` ascending. Concurrent callers get
    /// disjoint sets. An empty result is success; `limit == 0` is
    /// `StoreError::InvalidBatchLimit`. On error nothing was claimed.
    async fn claim_due(&self, limit: usize) -> StoreResult<Vec<TaskRecord>>;

    /// Record a terminal status for a `Running` record and clear `picked_at`.
    ///
    /// `claimed_at` is the `picked_at` the caller's claim returned. If the
    /// record was reclaimed and claimed again since, it no longer matches and
    /// the call fails with `StaleClaim`, leaving the newer claim untouched.
    /// Fails with `InvalidTransition` if the record is not `Running` (already
    /// terminal, or reclaimed and still pending) or `status` is not terminal.
    async fn writeback(
        &self,
        id: TaskId,
        claimed_at: DateTime<Utc>,
        status: TaskStatus,
    ) -> StoreResult<()>;

    /// Return every `Running` record picked at or before `now - max_running`
    /// to `Pending`. Returns the number of records reclaimed.
    async fn reset_stale(&self, max_running: Duration) -> StoreResult<u64>;

    async fn get(&self, id: TaskId) -> StoreResult<Option<TaskRecord>>;

    async fn counts(&self) -> StoreResult<StatusCounts>;
}
