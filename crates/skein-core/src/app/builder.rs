//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - store / executor が未設定なら build() が失敗する
//! - SchedulerConfig は build() 時に検証する
//! - 起動してからの設定ミスは起こらない

use std::sync::Arc;

use crate::config::{ConfigError, SchedulerConfig};
use crate::ports::{TaskExecutor, TaskStore};

use super::scheduler::Scheduler;

/// # 使用例
/// ```ignore
/// let app = SchedulerBuilder::new()
///     .store(Arc::new(PgTaskStore::connect(&dsn).await?))
///     .executor(Arc::new(SimulatedExecutor::default()))
///     .config(config)
///     .build()?;
/// let scheduler = app.spawn();
/// ```
pub struct SchedulerBuilder {
    store: Option<Arc<dyn TaskStore>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    config: SchedulerConfig,
    reaper: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no task store configured")]
    MissingStore,

    #[error("no task executor configured")]
    MissingExecutor,

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            executor: None,
            config: SchedulerConfig::default(),
            reaper: true,
        }
    }

    pub fn store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Workers only. Some other process is expected to run the reaper.
    pub fn without_reaper(mut self) -> Self {
        self.reaper = false;
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let executor = self.executor.ok_or(BuildError::MissingExecutor)?;
        self.config.validate()?;

        Ok(App {
            store,
            executor,
            config: self.config,
            reaper: self.reaper,
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated wiring, ready to spawn.
pub struct App {
    pub(super) store: Arc<dyn TaskStore>,
    pub(super) executor: Arc<dyn TaskExecutor>,
    pub(super) config: SchedulerConfig,
    pub(super) reaper: bool,
}

impl App {
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.store)
    }

    /// Start the worker loops (and the reaper) on the current runtime.
    pub fn spawn(self) -> Scheduler {
        Scheduler::spawn(self)
    }
}
