//! PgTaskStore - PostgreSQL が実装する正本
//!
//! Claiming relies on `FOR UPDATE SKIP LOCKED`: each claimant locks the due
//! rows it selects and skips rows another open transaction already holds, so
//! concurrent schedulers walk away with disjoint batches without waiting on
//! each other. The claim transaction commits before any execution starts.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use uuid::Uuid;

use crate::app::status::StatusCounts;
use crate::domain::{
    NewTask, StoreError, StoreResult, TaskId, TaskRecord, TaskStatus, TransitionError,
    stale_cutoff,
};
use crate::ports::{Clock, IdGenerator, SystemClock, TaskStore, UlidGenerator};

/// Embedded schema migrations (`crates/skein-core/migrations`).
pub static MIGRATOR: Migrator = sqlx::migrate!();

const CLAIM_DUE: &str = r#"
    WITH due AS (
        SELECT id
        FROM tasks
        WHERE status = 'PENDING'
          AND due_at <= $1
        ORDER BY due_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    )
    UPDATE tasks AS t
    SET status = 'RUNNING',
        picked_at = $1
    FROM due
    WHERE t.id = due.id
    RETURNING t.id, t.status, t.payload, t.due_at, t.created_at, t.picked_at
"#;

const RESET_STALE: &str = r#"
    UPDATE tasks
    SET status = 'PENDING',
        picked_at = NULL
    WHERE status = 'RUNNING'
      AND picked_at <= $1
"#;

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    status: String,
    payload: Vec<u8>,
    due_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    picked_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TaskStatus>()
            .map_err(|err| StoreError::Corrupt(format!("task {}: {err}", row.id)))?;
        Ok(TaskRecord {
            id: TaskId::from(row.id),
            status,
            payload: row.payload,
            due_at: row.due_at,
            created_at: row.created_at,
            picked_at: row.picked_at,
        })
    }
}

#[derive(Clone)]
pub struct PgTaskStore<C = SystemClock> {
    pool: PgPool,
    clock: C,
    ids: UlidGenerator<C>,
}

impl PgTaskStore<SystemClock> {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, SystemClock)
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(dsn: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(dsn).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }
}

impl<C: Clock + Clone> PgTaskStore<C> {
    pub fn with_clock(pool: PgPool, clock: C) -> Self {
        Self {
            pool,
            ids: UlidGenerator::new(clock.clone()),
            clock,
        }
    }
}

impl<C> PgTaskStore<C> {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> TaskStore for PgTaskStore<C> {
    async fn submit(&self, task: NewTask) -> StoreResult<TaskId> {
        let id = self.ids.generate_task_id();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, status, payload, due_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(TaskStatus::Pending.as_str())
        .bind(&task.payload)
        .bind(task.due_at)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim_due(&self, limit: usize) -> StoreResult<Vec<TaskRecord>> {
        if limit == 0 {
            return Err(StoreError::InvalidBatchLimit);
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query_as::<_, TaskRow>(CLAIM_DUE)
            .bind(now)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await?;
        // Decode before commit so a bad row rolls the whole batch back.
        let mut claimed = rows
            .into_iter()
            .map(TaskRecord::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        tx.commit().await?;

        // RETURNING does not preserve the CTE's order.
        claimed.sort_by_key(|r| (r.due_at, r.id));
        Ok(claimed)
    }

    async fn writeback(
        &self,
        id: TaskId,
        claimed_at: DateTime<Utc>,
        status: TaskStatus,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let current: Option<(String, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT status, picked_at FROM tasks WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let (current, picked_at) = current.ok_or(StoreError::NotFound(id))?;
        let current = current
            .parse::<TaskStatus>()
            .map_err(|err| StoreError::Corrupt(format!("task {id}: {err}")))?;

        if current == TaskStatus::Running && picked_at != Some(claimed_at) {
            return Err(StoreError::StaleClaim(id));
        }
        if current != TaskStatus::Running || !status.is_terminal() {
            return Err(TransitionError {
                id,
                from: current,
                to: status,
            }
            .into());
        }

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2,
                picked_at = NULL
            WHERE id = $1
              AND status = 'RUNNING'
              AND picked_at = $3
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(claimed_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StaleClaim(id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn reset_stale(&self, max_running: Duration) -> StoreResult<u64> {
        let cutoff = stale_cutoff(self.clock.now(), max_running);
        let result = sqlx::query(RESET_STALE)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, id: TaskId) -> StoreResult<Option<TaskRecord>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, status, payload, due_at, created_at, picked_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TaskRecord::try_from).transpose()
    }

    async fn counts(&self) -> StoreResult<StatusCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM tasks GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            let status = status
                .parse::<TaskStatus>()
                .map_err(|err| StoreError::Corrupt(err.to_string()))?;
            counts.add(status, n.max(0) as u64);
        }
        Ok(counts)
    }
}
