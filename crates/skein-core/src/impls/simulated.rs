//! SimulatedExecutor - 実行コードの代わり
//!
//! Stands in for real work: waits a fixed delay and reports success. Useful
//! for exercising a deployment end to end before wiring a real executor.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ExecutionError;
use crate::ports::TaskExecutor;

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, payload: &[u8]) -> Result<(), ExecutionError> {
        tracing::debug!(
            bytes = payload.len(),
            delay_ms = self.delay.as_millis() as u64,
            "simulating task"
        );
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn waits_for_the_delay_then_succeeds() {
        let executor = SimulatedExecutor::new(Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        executor.execute(b"{}").await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
