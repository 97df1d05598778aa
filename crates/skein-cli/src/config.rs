//! Configuration loading from environment variables.
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `PORT`: intake API listen port (default: 8080)
//! - `ENV`: deployment label, only logged; it does not pick the store (default: development)
//! - `SKEIN_BATCH_SIZE`: tasks claimed per poll cycle (default: 10)
//! - `SKEIN_IDLE_BACKOFF_MS`: wait after an empty cycle (default: 2000)
//! - `SKEIN_ERROR_BACKOFF_MS`: wait after a failed claim (default: 5000)
//! - `SKEIN_ZOMBIE_TIMEOUT_SECS`: liveness window for RUNNING tasks (default: 300)
//! - `SKEIN_REAP_INTERVAL_SECS`: zombie sweep cadence (default: 30)
//! - `SKEIN_WORKERS`: poll loops per process (default: 1)
//! - `SKEIN_CONCURRENT_EXECUTION`: run a batch concurrently (default: false)
//! - `SKEIN_EXEC_DELAY_MS`: simulated execution time (default: 500)
//!
//! A variable that is set but does not parse is an error, not a silent default.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use skein_core::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_ERROR_BACKOFF, DEFAULT_IDLE_BACKOFF, DEFAULT_REAP_INTERVAL,
    DEFAULT_ZOMBIE_TIMEOUT, ExecutionMode, SchedulerConfig,
};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_EXEC_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub environment: String,
    pub scheduler: SchedulerConfig,
    /// How long `SimulatedExecutor` pretends each task takes.
    pub exec_delay: Duration,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL environment variable is required")?;

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let environment = lookup("ENV").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let execution = if parse_flag(&lookup, "SKEIN_CONCURRENT_EXECUTION")? {
            ExecutionMode::Concurrent
        } else {
            ExecutionMode::Sequential
        };

        let scheduler = SchedulerConfig {
            batch_size: parse_or(&lookup, "SKEIN_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            idle_backoff: millis_or(&lookup, "SKEIN_IDLE_BACKOFF_MS", DEFAULT_IDLE_BACKOFF)?,
            error_backoff: millis_or(&lookup, "SKEIN_ERROR_BACKOFF_MS", DEFAULT_ERROR_BACKOFF)?,
            zombie_timeout: secs_or(&lookup, "SKEIN_ZOMBIE_TIMEOUT_SECS", DEFAULT_ZOMBIE_TIMEOUT)?,
            reap_interval: secs_or(&lookup, "SKEIN_REAP_INTERVAL_SECS", DEFAULT_REAP_INTERVAL)?,
            workers: parse_or(&lookup, "SKEIN_WORKERS", 1)?,
            execution,
        };
        scheduler
            .validate()
            .context("invalid scheduler configuration")?;

        let exec_delay = millis_or(&lookup, "SKEIN_EXEC_DELAY_MS", DEFAULT_EXEC_DELAY)?;

        Ok(Self {
            database_url,
            port,
            environment,
            scheduler,
            exec_delay,
        })
    }

    /// Test configuration from a fixed map.
    #[cfg(test)]
    pub fn from_map(vars: &std::collections::HashMap<&str, &str>) -> Result<Self> {
        Self::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(key) {
        Some(_) => parse_or(lookup, key, 0u64).map(Duration::from_millis),
        None => Ok(default),
    }
}

fn secs_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match lookup(key) {
        Some(_) => parse_or(lookup, key, 0u64).map(Duration::from_secs),
        None => Ok(default),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => bail!("invalid {key}: {raw:?}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([("DATABASE_URL", "postgres://localhost/skein")])
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_map(&base()).unwrap();

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.environment, "development");
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.exec_delay, DEFAULT_EXEC_DELAY);
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let err = AppConfig::from_map(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn overrides_are_read() {
        let mut vars = base();
        vars.extend([
            ("PORT", "9000"),
            ("ENV", "production"),
            ("SKEIN_BATCH_SIZE", "25"),
            ("SKEIN_IDLE_BACKOFF_MS", "250"),
            ("SKEIN_ERROR_BACKOFF_MS", "1000"),
            ("SKEIN_ZOMBIE_TIMEOUT_SECS", "60"),
            ("SKEIN_REAP_INTERVAL_SECS", "5"),
            ("SKEIN_WORKERS", "3"),
            ("SKEIN_CONCURRENT_EXECUTION", "true"),
            ("SKEIN_EXEC_DELAY_MS", "0"),
        ]);

        let config = AppConfig::from_map(&vars).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.environment, "production");
        assert_eq!(
            config.scheduler,
            SchedulerConfig {
                batch_size: 25,
                idle_backoff: Duration::from_millis(250),
                error_backoff: Duration::from_secs(1),
                zombie_timeout: Duration::from_secs(60),
                reap_interval: Duration::from_secs(5),
                workers: 3,
                execution: ExecutionMode::Concurrent,
            }
        );
        assert_eq!(config.exec_delay, Duration::ZERO);
    }

    #[test]
    fn unparseable_values_are_rejected() {
        let mut vars = base();
        vars.insert("SKEIN_BATCH_SIZE", "ten");
        let err = AppConfig::from_map(&vars).unwrap_err();
        assert!(err.to_string().contains("SKEIN_BATCH_SIZE"));

        let mut vars = base();
        vars.insert("SKEIN_CONCURRENT_EXECUTION", "maybe");
        assert!(AppConfig::from_map(&vars).is_err());
    }

    #[test]
    fn zero_liveness_window_is_rejected() {
        let mut vars = base();
        vars.insert("SKEIN_ZOMBIE_TIMEOUT_SECS", "0");
        assert!(AppConfig::from_map(&vars).is_err());
    }
}
