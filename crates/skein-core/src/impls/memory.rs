//! InMemoryTaskStore - 開発・テスト用の store
//!
//! # 実装詳細
//! - `HashMap<TaskId, TaskRecord>` を tokio の Mutex で保護
//! - claim は lock を保持したまま select → update するので、
//!   row lock + SKIP LOCKED と同じ排他になる（同時に claim 中の行は存在しない）
//! - claim は変更を staging してから適用するので、途中で失敗しても何も変わらない

use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::app::status::StatusCounts;
use crate::domain::{
    NewTask, StoreError, StoreResult, TaskId, TaskRecord, TaskStatus, TransitionError,
    stale_cutoff,
};
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

/// Store operation at which an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Submit,
    /// Fires after the batch is staged and before it is applied.
    Claim,
    Writeback,
    Reset,
}

pub struct InMemoryTaskStore<C = SystemClock> {
    records: Mutex<HashMap<TaskId, TaskRecord>>,
    faults: StdMutex<HashMap<FaultPoint, u32>>,
    clock: C,
    ids: UlidGenerator<C>,
}

impl InMemoryTaskStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryTaskStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> InMemoryTaskStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            faults: StdMutex::new(HashMap::new()),
            ids: UlidGenerator::new(clock.clone()),
            clock,
        }
    }
}

impl<C> InMemoryTaskStore<C> {
    /// Make the next `times` calls at `point` fail with `StoreError::Unavailable`.
    pub fn inject_fault(&self, point: FaultPoint, times: u32) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        *faults.entry(point).or_default() += times;
    }

    /// Copy of every record, for assertions.
    pub async fn snapshot(&self) -> Vec<TaskRecord> {
        let records = self.records.lock().await;
        let mut all: Vec<TaskRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| (r.due_at, r.id));
        all
    }

    fn trip(&self, point: FaultPoint) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        match faults.get_mut(&point) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(StoreError::Unavailable(format!("injected {point:?} fault")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl<C: Clock> TaskStore for InMemoryTaskStore<C> {
    async fn submit(&self, task: NewTask) -> StoreResult<TaskId> {
        self.trip(FaultPoint::Submit)?;
        let id = self.ids.generate_task_id();
        let record = TaskRecord::new(id, task, self.clock.now());

        let mut records = self.records.lock().await;
        records.insert(id, record);
        Ok(id)
    }

    async fn claim_due(&self, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        if limit == 0 {
            return Err(StoreError::InvalidBatchLimit);
        }

        let mut records = self.records.lock().await;
        let now = self.clock.now();

        let mut due: Vec<&TaskRecord> = records.values().filter(|r| r.is_due(now)).collect();
        due.sort_by_key(|r| (r.due_at, r.id));

        let staged = due
            .into_iter()
            .take(limit)
            .map(|r| {
                let mut claimed = r.clone();
                claimed.claim(now)?;
                Ok(claimed)
            })
            .collect::<Result<Vec<_>, TransitionError>>()?;

        self.trip(FaultPoint::Claim)?;

        for claimed in &staged {
            records.insert(claimed.id, claimed.clone());
        }
        Ok(staged)
    }

    async fn writeback(
        &self,
        id: TaskId,
        claimed_at: DateTime<Utc>,
        status: TaskStatus,
    ) -> StoreResult<()> {
        self.trip(FaultPoint::Writeback)?;
        let mut records = self.records.lock().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status == TaskStatus::Running && !record.holds_claim(claimed_at) {
            return Err(StoreError::StaleClaim(id));
        }
        record.finish(status)?;
        Ok(())
    }

    async fn reset_stale(&self, max_running: Duration) -> StoreResult<u64> {
        self.trip(FaultPoint::Reset)?;
        let mut records = self.records.lock().await;
        let cutoff = stale_cutoff(self.clock.now(), max_running);

        let mut reclaimed = 0;
        for record in records.values_mut().filter(|r| r.is_stale(cutoff)) {
            record.reclaim()?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    async fn get(&self, id: TaskId) -> StoreResult<Option<TaskRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(&id).cloned())
    }

    async fn counts(&self) -> StoreResult<StatusCounts> {
        let records = self.records.lock().await;
        let mut counts = StatusCounts::default();
        for record in records.values() {
            counts.add(record.status, 1);
        }
        Ok(counts)
    }
}
