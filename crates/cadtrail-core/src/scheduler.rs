//! Fixed-interval poll loop.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A background task calling `tick` every interval until cancelled.
///
/// Ticks never overlap: a slow tick delays the next one and missed ticks
/// are skipped rather than replayed.
pub struct Poller {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling. The first tick fires one interval after start.
    ///
    /// `tick` returns `false` to stop the loop.
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(interval_ms = interval.as_millis() as u64, "Poller started");

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        if !tick().await {
                            info!("Poller stopped by its tick");
                            break;
                        }
                    }
                }
            }

            debug!("Poller stopped");
        });

        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop and wait for an in-flight tick to finish.
    pub async fn stop(mut self) {
        self.token.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let poller = Poller::spawn(Duration::from_millis(100), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        poller.stop().await;
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 3);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_can_end_the_loop() {
        let poller = Poller::spawn(Duration::from_millis(10), || async { false });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!poller.is_running());
        poller.stop().await;
    }
}
