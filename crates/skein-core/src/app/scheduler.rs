use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::builder::App;
use super::reaper_loop::ReaperLoop;
use super::worker_loop::WorkerLoop;

/// Running scheduler handle.
/// - `request_shutdown()` で全ループに停止を通知
/// - `shutdown_and_join()` で in-flight の batch が終わるまで待つ
/// - handle を drop しても sender が消えるのでループは止まる
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn `config.workers` worker loops plus the reaper, if enabled.
    pub(super) fn spawn(app: App) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = app.config.workers;

        let mut joins = Vec::with_capacity(workers + 1);
        for worker_id in 0..workers {
            let worker = WorkerLoop::new(
                worker_id,
                Arc::clone(&app.store),
                Arc::clone(&app.executor),
                &app.config,
                shutdown_rx.clone(),
            );
            joins.push(tokio::spawn(worker.run()));
        }

        if app.reaper {
            let reaper = ReaperLoop::new(Arc::clone(&app.store), &app.config, shutdown_rx);
            joins.push(tokio::spawn(reaper.run()));
        }

        info!(workers, reaper = app.reaper, "scheduler started");
        Self { shutdown_tx, joins }
    }

    /// Ask every loop to stop.
    /// In-flight batches are not cancelled; loops exit at their next check.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for every loop.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                warn!(error = %err, "scheduler loop ended abnormally");
            }
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::app::SchedulerBuilder;
    use crate::config::SchedulerConfig;
    use crate::domain::{NewTask, TaskStatus};
    use crate::impls::{InMemoryTaskStore, SimulatedExecutor};
    use crate::ports::{ManualClock, TaskStore};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn workers_drain_the_store_and_stop() {
        let store = Arc::new(InMemoryTaskStore::with_clock(ManualClock::new(t0())));
        for _ in 0..40 {
            store.submit(NewTask::new(t0(), vec![])).await.unwrap();
        }

        let scheduler = SchedulerBuilder::new()
            .store(store.clone())
            .executor(Arc::new(SimulatedExecutor::new(Duration::from_millis(100))))
            .config(SchedulerConfig {
                workers: 4,
                ..Default::default()
            })
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler.shutdown_and_join().await;

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.completed, 40);
        assert_eq!(counts.total(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_returns_abandoned_tasks_to_workers() {
        let clock = ManualClock::new(t0());
        let store = Arc::new(InMemoryTaskStore::with_clock(clock.clone()));
        let id = store.submit(NewTask::new(t0(), vec![])).await.unwrap();

        // a crashed scheduler claimed it and never came back
        store.claim_due(1).await.unwrap();
        clock.advance(Duration::from_secs(600));

        let scheduler = SchedulerBuilder::new()
            .store(store.clone())
            .executor(Arc::new(SimulatedExecutor::new(Duration::ZERO)))
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_secs(5)).await;
        scheduler.shutdown_and_join().await;

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_promptly_when_idle() {
        let scheduler = SchedulerBuilder::new()
            .store(Arc::new(InMemoryTaskStore::new()))
            .executor(Arc::new(SimulatedExecutor::default()))
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let start = tokio::time::Instant::now();
        scheduler.shutdown_and_join().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
