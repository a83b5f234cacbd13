use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Exponential backoff with optional jitter around an async operation.
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before the attempt after `attempt` (0-based), before jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self
            .config
            .exponential_base
            .powi(attempt.min(i32::MAX as u32) as i32);
        let max_secs = self.config.max_delay.as_secs_f64();
        let secs = (self.config.base_delay.as_secs_f64() * factor).min(max_secs);
        if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            self.config.max_delay
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
    }

    /// Retries every error.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(operation, op, |_| true).await
    }

    /// Retries while `should_retry` accepts the error; anything else is
    /// returned immediately. After `max_attempts` the last error is returned.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        operation: &str,
        mut op: F,
        should_retry: P,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !should_retry(&err) {
                return Err(err);
            }
            if attempt + 1 >= max_attempts {
                error!(
                    operation,
                    attempts = max_attempts,
                    error = %err,
                    "all retry attempts failed"
                );
                return Err(err);
            }

            let delay = self.jittered(self.backoff_delay(attempt));
            warn!(
                operation,
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32, jitter: bool) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            exponential_base: 2.0,
            jitter,
        })
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = policy(5, false);
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(4), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(200), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_to_full_delay() {
        let policy = policy(3, true);
        let base = Duration::from_millis(1000);
        for _ in 0..1000 {
            let delay = policy.jittered(base);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= base, "{delay:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = policy(3, false);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<&str, String> = policy
            .run("flaky", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(format!("failure {n}")) } else { Ok("done") }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_returns_last_error() {
        let policy = policy(4, true);
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let started = tokio::time::Instant::now();

        let result: Result<(), String> = policy
            .run("down", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {n}"))
            })
            .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // jittered 100 + 200 + 400 ms lands between half and full
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(350), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(700), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_errors_return_immediately() {
        let policy = policy(5, false);
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<(), &str> = policy
            .run_if(
                "reject",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("bad request")
                },
                |err| *err != "bad request",
            )
            .await;

        assert_eq!(result, Err("bad request"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let policy = policy(0, false);
        let result: Result<u8, &str> = policy.run("once", || async { Ok(1) }).await;
        assert_eq!(result, Ok(1));
    }
}
