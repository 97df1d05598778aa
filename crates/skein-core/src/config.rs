//! Scheduler tuning.
//!
//! Every knob has a documented fallback here; nothing in the loops hardcodes
//! a value. Loading from the environment is the binary's job.

use std::time::Duration;

use crate::app::pacing::Pacing;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_ZOMBIE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// How a worker runs the tasks of one claimed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One after another, in `due_at` order.
    #[default]
    Sequential,
    /// All at once; writebacks land in completion order.
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum tasks claimed per cycle.
    pub batch_size: usize,
    /// Wait after a cycle that found nothing due.
    pub idle_backoff: Duration,
    /// Wait after a cycle whose claim failed.
    pub error_backoff: Duration,
    /// Liveness window: a task `Running` for longer is presumed abandoned.
    /// Must exceed the longest legitimate execution.
    pub zombie_timeout: Duration,
    /// Cadence of the zombie sweep.
    pub reap_interval: Duration,
    /// Worker loops per process.
    pub workers: usize,
    pub execution: ExecutionMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            zombie_timeout: DEFAULT_ZOMBIE_TIMEOUT,
            reap_interval: DEFAULT_REAP_INTERVAL,
            workers: 1,
            execution: ExecutionMode::Sequential,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("workers must be at least 1")]
    ZeroWorkers,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        for (name, value) in [
            ("idle_backoff", self.idle_backoff),
            ("error_backoff", self.error_backoff),
            ("zombie_timeout", self.zombie_timeout),
            ("reap_interval", self.reap_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        Ok(())
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            idle: self.idle_backoff,
            error: self.error_backoff,
        }
    }
}
