use std::sync::atomic::Ordering::Relaxed;
use std::sync::{atomic::AtomicBool, Arc};
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

use crate::server_config::cfg;

/// Process-wide limiter serializing outbound prompt calls. The bucket holds
/// a single token refilled once per minimum interval, so two back-to-back
/// calls are always spaced by at least the configured gap.
#[derive(Clone)]
pub struct RateLimiters {
    prompt: Arc<RateLimiter>,
    backoff: Arc<AtomicBool>,
    backoff_duration: Duration,
}

impl RateLimiters {
    pub fn new(min_interval_ms: usize) -> Self {
        let prompt = RateLimiter::builder()
            .initial(1)
            .interval(Duration::from_millis(min_interval_ms as u64))
            .max(1)
            .refill(1)
            .build();

        Self {
            prompt: Arc::new(prompt),
            backoff: Arc::new(AtomicBool::new(false)),
            backoff_duration: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> Self {
        Self::new(cfg.api.prompt_limits.min_interval_ms)
    }

    pub async fn acquire_one(&self) {
        if self.backoff.load(Relaxed) {
            tokio::time::sleep(self.backoff_duration).await;
        }
        self.prompt.acquire_one().await;
    }

    /// Cool down after the provider reports throttling. Cleared by a
    /// background task once the window passes.
    pub fn trigger_backoff(&self) {
        tracing::info!("Triggering backoff...");
        self.backoff
            .store(true, std::sync::atomic::Ordering::Relaxed);
        let self_ = self.clone();
        let duration = self.backoff_duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            tracing::info!("Backoff expired");
            self_
                .backoff
                .store(false, std::sync::atomic::Ordering::Relaxed);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_minimum_interval_between_acquires() {
        let limiters = RateLimiters::new(300);

        let start = Instant::now();
        limiters.acquire_one().await;
        limiters.acquire_one().await;

        // Allow a little scheduling jitter below the configured 300ms.
        assert!(
            start.elapsed() >= Duration::from_millis(280),
            "acquires were only {:?} apart",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiters = RateLimiters::new(300);

        let start = Instant::now();
        limiters.acquire_one().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
