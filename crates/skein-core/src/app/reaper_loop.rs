//! ReaperLoop - 期限切れ RUNNING タスクの回収（zombie reclaimer）
//!
//! # フロー
//! 1. 起動直後に一度 sweep
//! 2. `reap_interval` ごとに `TaskStore::reset_stale()` を呼ぶ
//! 3. RUNNING のまま `zombie_timeout` を超えたタスクは PENDING に戻る
//!
//! The reaper cannot tell a crashed worker from a slow one: a task still
//! executing past the window is handed out again, so execution is
//! at-least-once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::pacing::{Wake, sleep_or_shutdown};
use crate::config::SchedulerConfig;
use crate::domain::StoreResult;
use crate::ports::TaskStore;

pub struct ReaperLoop {
    store: Arc<dyn TaskStore>,
    max_running: Duration,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ReaperLoop {
    pub fn new(
        store: Arc<dyn TaskStore>,
        config: &SchedulerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            max_running: config.zombie_timeout,
            interval: config.reap_interval,
            shutdown_rx,
        }
    }

    /// One sweep. Returns how many tasks went back to `Pending`.
    pub async fn reap_once(&self) -> StoreResult<u64> {
        let reclaimed = self.store.reset_stale(self.max_running).await?;
        if reclaimed > 0 {
            warn!(
                reclaimed,
                max_running_secs = self.max_running.as_secs(),
                "reclaimed stale running tasks"
            );
        } else {
            debug!("no stale running tasks");
        }
        Ok(reclaimed)
    }

    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_running_secs = self.max_running.as_secs(),
            "reaper loop started"
        );

        loop {
            // 失敗しても次の sweep で再試行
            if let Err(err) = self.reap_once().await {
                warn!(error = %err, kind = ?err.kind(), "stale task sweep failed");
            }

            if sleep_or_shutdown(self.interval, &mut self.shutdown_rx).await == Wake::Shutdown {
                break;
            }
        }

        info!("reaper loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::domain::{NewTask, TaskStatus};
    use crate::impls::{FaultPoint, InMemoryTaskStore};
    use crate::ports::ManualClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            zombie_timeout: Duration::from_secs(60),
            reap_interval: Duration::from_secs(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn reap_once_returns_reclaimed_count() {
        let clock = ManualClock::new(t0());
        let store = Arc::new(InMemoryTaskStore::with_clock(clock.clone()));
        for _ in 0..3 {
            store.submit(NewTask::new(t0(), vec![])).await.unwrap();
        }
        store.claim_due(2).await.unwrap();
        let (_tx, rx) = watch::channel(false);
        let reaper = ReaperLoop::new(store.clone(), &config(), rx);

        assert_eq!(reaper.reap_once().await.unwrap(), 0);

        clock.advance(Duration::from_secs(60));
        assert_eq!(reaper.reap_once().await.unwrap(), 2);
        assert_eq!(store.counts().await.unwrap().pending, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_on_start_and_survives_errors() {
        let clock = ManualClock::new(t0());
        let store = Arc::new(InMemoryTaskStore::with_clock(clock.clone()));
        let id = store.submit(NewTask::new(t0(), vec![])).await.unwrap();
        store.claim_due(1).await.unwrap();
        clock.advance(Duration::from_secs(120));
        store.inject_fault(FaultPoint::Reset, 1);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(ReaperLoop::new(store.clone(), &config(), rx).run());

        // first sweep hits the fault, second one reclaims
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get(id).await.unwrap().unwrap().status, TaskStatus::Running);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.get(id).await.unwrap().unwrap().status, TaskStatus::Pending);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
