//! WorkerLoop - タスク実行ループ（poll loop）
//!
//! # フロー
//! 1. `TaskStore::claim_due()` で due なタスクを batch で claim（RUNNING になる）
//! 2. 空なら idle backoff、エラーなら error backoff
//! 3. 各タスクを `TaskExecutor` で実行
//! 4. `TaskStore::writeback()` で COMPLETED / FAILED を記録
//!
//! A writeback that fails is only logged: the task stays `Running` and the
//! reaper hands it out again once the liveness window passes. The same holds
//! when the claim was superseded: the store fences the late writeback and
//! the newer claimant's result stands.
//!
//! Each execution runs on its own tokio task, so a panicking executor marks
//! that task `FAILED` instead of taking the loop down.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::pacing::{Backoff, Pacing, Wake, shutdown_requested};
use crate::config::{ExecutionMode, SchedulerConfig};
use crate::domain::{StoreResult, TaskRecord, TaskStatus};
use crate::ports::{TaskExecutor, TaskStore};

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Tasks left `Running` because their terminal status could not be stored.
    pub writeback_failures: usize,
}

impl CycleReport {
    fn record(&mut self, processed: Processed) {
        match processed {
            Processed::Recorded(TaskStatus::Completed) => self.completed += 1,
            Processed::Recorded(_) => self.failed += 1,
            Processed::WritebackFailed => self.writeback_failures += 1,
        }
    }
}

enum Processed {
    Recorded(TaskStatus),
    WritebackFailed,
}

pub struct WorkerLoop {
    worker_id: usize,
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn TaskExecutor>,
    batch_size: usize,
    execution: ExecutionMode,
    pacing: Pacing,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerLoop {
    pub fn new(
        worker_id: usize,
        store: Arc<dyn TaskStore>,
        executor: Arc<dyn TaskExecutor>,
        config: &SchedulerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id,
            store,
            executor,
            batch_size: config.batch_size,
            execution: config.execution,
            pacing: config.pacing(),
            shutdown_rx,
        }
    }

    /// Run until shutdown.
    ///
    /// Shutdown is only observed between cycles: a batch that has been
    /// claimed is executed and written back before the loop exits.
    pub async fn run(mut self) {
        info!(
            worker_id = self.worker_id,
            batch_size = self.batch_size,
            mode = ?self.execution,
            "worker loop started"
        );

        loop {
            if shutdown_requested(&self.shutdown_rx) {
                break;
            }

            // claim は shutdown と select しない（トランザクションを途中で捨てない）
            let backoff = match self.poll_once().await {
                Ok(report) if report.claimed == 0 => Some(Backoff::Idle),
                Ok(report) => {
                    info!(
                        worker_id = self.worker_id,
                        claimed = report.claimed,
                        completed = report.completed,
                        failed = report.failed,
                        writeback_failures = report.writeback_failures,
                        "batch processed"
                    );
                    None
                }
                Err(err) => {
                    warn!(
                        worker_id = self.worker_id,
                        error = %err,
                        kind = ?err.kind(),
                        "claim failed; backing off"
                    );
                    Some(Backoff::Error)
                }
            };

            let Some(backoff) = backoff else {
                continue;
            };
            if self.pacing.wait(backoff, &mut self.shutdown_rx).await == Wake::Shutdown {
                break;
            }
        }

        info!(worker_id = self.worker_id, "worker loop stopped");
    }

    /// One cycle: claim a batch, execute it, write back every outcome.
    ///
    /// Only the claim can fail the cycle; execution and writeback problems
    /// are counted in the report.
    pub async fn poll_once(&self) -> StoreResult<CycleReport> {
        let batch = self.store.claim_due(self.batch_size).await?;
        let mut report = CycleReport {
            claimed: batch.len(),
            ..CycleReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }
        debug!(worker_id = self.worker_id, claimed = batch.len(), "claimed batch");

        match self.execution {
            ExecutionMode::Sequential => {
                for task in batch {
                    let processed = process(
                        self.worker_id,
                        Arc::clone(&self.store),
                        Arc::clone(&self.executor),
                        task,
                    )
                    .await;
                    report.record(processed);
                }
            }
            ExecutionMode::Concurrent => {
                let mut running = JoinSet::new();
                for task in batch {
                    let store = Arc::clone(&self.store);
                    let executor = Arc::clone(&self.executor);
                    let worker_id = self.worker_id;
                    running.spawn(process(worker_id, store, executor, task));
                }
                while let Some(joined) = running.join_next().await {
                    match joined {
                        Ok(processed) => report.record(processed),
                        Err(err) => {
                            error!(
                                worker_id = self.worker_id,
                                error = %err,
                                "task join failed; leaving it for the reaper"
                            );
                            report.writeback_failures += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

async fn process(
    worker_id: usize,
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn TaskExecutor>,
    task: TaskRecord,
) -> Processed {
    let TaskRecord {
        id,
        payload,
        picked_at,
        ..
    } = task;
    let Some(claimed_at) = picked_at else {
        error!(
            worker_id,
            task_id = %id,
            "claimed task has no picked_at; leaving it for the reaper"
        );
        return Processed::WritebackFailed;
    };

    let execution = tokio::spawn(async move { executor.execute(&payload).await });
    let status = match execution.await {
        Ok(Ok(())) => TaskStatus::Completed,
        Ok(Err(err)) => {
            warn!(worker_id, task_id = %id, error = %err, "task failed");
            TaskStatus::Failed
        }
        Err(err) => {
            error!(worker_id, task_id = %id, error = %err, "task execution aborted");
            TaskStatus::Failed
        }
    };

    match store.writeback(id, claimed_at, status).await {
        Ok(()) => {
            debug!(worker_id, task_id = %id, %status, "task finished");
            Processed::Recorded(status)
        }
        Err(err) => {
            error!(
                worker_id,
                task_id = %id,
                %status,
                error = %err,
                kind = ?err.kind(),
                "writeback failed; task stays RUNNING until reclaimed"
            );
            Processed::WritebackFailed
        }
    }
}
