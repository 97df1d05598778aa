//! Pacing - ループの待ち時間と shutdown の競合
//!
//! Waits are plain `tokio::time` sleeps raced against the shutdown signal, so
//! tests run them under a paused runtime and advance time instantly.

use std::time::Duration;

use tokio::sync::watch;

/// Why a worker loop is about to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Nothing was due.
    Idle,
    /// The claim failed.
    Error,
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub idle: Duration,
    pub error: Duration,
}

impl Pacing {
    pub fn delay(&self, backoff: Backoff) -> Duration {
        match backoff {
            Backoff::Idle => self.idle,
            Backoff::Error => self.error,
        }
    }

    pub async fn wait(&self, backoff: Backoff, shutdown_rx: &mut watch::Receiver<bool>) -> Wake {
        sleep_or_shutdown(self.delay(backoff), shutdown_rx).await
    }
}

/// `true` once shutdown was requested or the sender is gone.
pub fn shutdown_requested(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err()
}

/// Sleep for `delay` unless shutdown arrives first.
pub async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> Wake {
    if shutdown_requested(shutdown_rx) {
        return Wake::Shutdown;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Wake::Elapsed,
            changed = shutdown_rx.changed() => {
                // sender dropped == shutdown
                if changed.is_err() || *shutdown_rx.borrow() {
                    return Wake::Shutdown;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn pacing() -> Pacing {
        Pacing {
            idle: Duration::from_secs(2),
            error: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_and_error_use_their_own_delay() {
        let (_tx, mut rx) = watch::channel(false);

        let start = Instant::now();
        assert_eq!(pacing().wait(Backoff::Idle, &mut rx).await, Wake::Elapsed);
        let idle = start.elapsed();
        assert!(idle >= Duration::from_secs(2) && idle < Duration::from_secs(3));

        let start = Instant::now();
        assert_eq!(pacing().wait(Backoff::Error, &mut rx).await, Wake::Elapsed);
        let error = start.elapsed();
        assert!(error >= Duration::from_secs(5) && error < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cuts_the_wait_short() {
        let (tx, mut rx) = watch::channel(false);

        let waiter = tokio::spawn(async move {
            let start = Instant::now();
            let wake = pacing().wait(Backoff::Error, &mut rx).await;
            (wake, start.elapsed())
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        let (wake, elapsed) = waiter.await.unwrap();
        assert_eq!(wake, Wake::Shutdown);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(shutdown_requested(&rx));
        assert_eq!(pacing().wait(Backoff::Idle, &mut rx).await, Wake::Shutdown);
    }
}
