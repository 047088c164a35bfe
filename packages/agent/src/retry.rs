// ABOUTME: Exponential-backoff retry wrapper applied explicitly at call sites
// ABOUTME: Retries matching errors with jittered delays and re-raises the last error

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry wrapper parameterized by attempt count and backoff policy.
///
/// Delay between attempts is `min(base_delay * 2^(attempt-1) + jitter, max_delay)`
/// with up to one second of uniform jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Run an operation, retrying errors for which `is_retryable` returns
    /// true. Non-matching errors propagate immediately; the last error is
    /// re-raised once attempts are exhausted.
    pub async fn run<T, E, F, Fut, P>(&self, is_retryable: P, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= self.max_attempts || !is_retryable(&e) {
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    debug!("Attempt {} failed, retrying in {:?}", attempt, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
        (exponential + jitter).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(60))
    }
}
