//! Task record: the durable unit of schedulable work.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::TransitionError;
use super::{TaskId, TaskStatus};

/// Intake input: when the task becomes due and what to hand the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub due_at: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl NewTask {
    pub fn new(due_at: DateTime<Utc>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            due_at,
            payload: payload.into(),
        }
    }
}

/// A persisted task.
///
/// Design:
/// - `picked_at` is `Some` iff `status == Running`.
/// - `id` and `created_at` are fixed at intake.
/// - Transitions go through the methods below so the invariant cannot drift;
///   stores apply the same rules in SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub status: TaskStatus,
    pub payload: Vec<u8>,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// A fresh record in `Pending`.
    pub fn new(id: TaskId, task: NewTask, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            payload: task.payload,
            due_at: task.due_at,
            created_at,
            picked_at: None,
        }
    }

    /// Eligible for claiming at `now` (due time is inclusive).
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Pending && self.due_at <= now
    }

    /// Running and picked at or before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Running && self.picked_at.is_some_and(|t| t <= cutoff)
    }

    /// Still `Running` under the claim made at `claimed_at`.
    ///
    /// `picked_at` doubles as the claim token: a reclaim clears it and a
    /// re-claim stamps a new one, so an older claimant no longer matches.
    pub fn holds_claim(&self, claimed_at: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Running && self.picked_at == Some(claimed_at)
    }

    /// Pending -> Running.
    pub fn claim(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Running)?;
        self.picked_at = Some(now);
        Ok(())
    }

    /// Running -> Completed | Failed.
    pub fn finish(&mut self, status: TaskStatus) -> Result<(), TransitionError> {
        if !status.is_terminal() {
            return Err(self.rejected(status));
        }
        self.transition(status)?;
        self.picked_at = None;
        Ok(())
    }

    /// Running -> Pending (zombie reclaim).
    pub fn reclaim(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Pending)?;
        self.picked_at = None;
        Ok(())
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(self.rejected(next));
        }
        self.status = next;
        Ok(())
    }

    fn rejected(&self, to: TaskStatus) -> TransitionError {
        TransitionError {
            id: self.id,
            from: self.status,
            to,
        }
    }
}

/// Latest `picked_at` that counts as stale at `now`.
pub fn stale_cutoff(now: DateTime<Utc>, max_running: StdDuration) -> DateTime<Utc> {
    chrono::Duration::from_std(max_running)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
