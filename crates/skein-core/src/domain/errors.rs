//! Errors - エラー型と分類

use thiserror::Error;

use super::{TaskId, TaskStatus};

/// ErrorKind は store エラーの運用分類
///
/// - Transient: 接続断・タイムアウト（backoff してリトライ）
/// - Conflict: トランザクション競合（サイクルごとリトライ）
/// - Caller: 呼び出し側の誤り（リトライしても直らない）
/// - Permanent: データ不整合など
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Conflict,
    Caller,
    Permanent,
}

/// A state machine violation on a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition for {id}: {from} -> {to}")]
pub struct TransitionError {
    pub id: TaskId,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch limit must be at least 1")]
    InvalidBatchLimit,

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The task was reclaimed since this claim; another claimant may own it.
    #[error("claim on {0} is no longer held")]
    StaleClaim(TaskId),

    #[error("corrupt task row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidBatchLimit
            | StoreError::NotFound(_)
            | StoreError::InvalidTransition(_) => ErrorKind::Caller,
            StoreError::StaleClaim(_) => ErrorKind::Conflict,
            StoreError::Corrupt(_) | StoreError::Migration(_) => ErrorKind::Permanent,
            StoreError::Unavailable(_) => ErrorKind::Transient,
            StoreError::Database(err) => classify_sqlx(err),
        }
    }
}

fn classify_sqlx(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // serialization_failure, deadlock_detected
            Some("40001") | Some("40P01") => ErrorKind::Conflict,
            _ => ErrorKind::Permanent,
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => ErrorKind::Permanent,
        _ => ErrorKind::Transient,
    }
}

/// Failure reported by the execution collaborator. Recorded as `Failed`, not a
/// system error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("execution failed: {0}")]
pub struct ExecutionError(pub String);

impl ExecutionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn caller_errors_are_classified() {
        let id = TaskId::from_ulid(Ulid::new());
        assert_eq!(StoreError::InvalidBatchLimit.kind(), ErrorKind::Caller);
        assert_eq!(StoreError::NotFound(id).kind(), ErrorKind::Caller);
        assert_eq!(StoreError::StaleClaim(id).kind(), ErrorKind::Conflict);
    }

    #[test]
    fn pool_timeouts_are_transient() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(
            StoreError::Unavailable("down".into()).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn transition_error_message_names_both_states() {
        let id = TaskId::from_ulid(Ulid::new());
        let err = StoreError::from(TransitionError {
            id,
            from: TaskStatus::Completed,
            to: TaskStatus::Running,
        });
        let msg = err.to_string();
        assert!(msg.contains("COMPLETED -> RUNNING"));
    }
}
