//! Retry with exponential backoff and jitter
//!
//! Ledger submissions can be rejected at commit validation even when
//! simulation succeeded. Those rejections leave no state behind, so the
//! coordinator resubmits them through [`Retry`]. Writing commit coordinates
//! back to SQLite is retried the same way while the database is busy.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = just the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0); 0.0 disables jitter
    pub jitter: f64,
    /// Draw delays from `[initial_delay, 3 * delay]` instead of `delay ± jitter`
    pub decorrelated_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.5,
            decorrelated_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Short delays, for in-memory operations and tests
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: 0.3,
            decorrelated_jitter: false,
        }
    }

    /// Local store operations (SQLite busy/locked)
    pub fn database() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.5,
            decorrelated_jitter: true,
        }
    }

    /// Ledger submissions
    pub fn ledger() -> Self {
        Self {
            max_retries: 8,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
            jitter: 0.5,
            decorrelated_jitter: true,
        }
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter factor, clamped to 0.0-1.0
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(capped);
        }

        let mut rng = rand::thread_rng();
        let delay = if self.decorrelated_jitter {
            let low = self.initial_delay.as_secs_f64();
            let high = (capped * 3.0).min(self.max_delay.as_secs_f64()).max(low);
            rng.gen_range(low..=high)
        } else {
            let spread = capped * self.jitter;
            (capped + rng.gen_range(-spread..=spread)).max(0.0)
        };

        Duration::from_secs_f64(delay)
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// Final result: the first success or the last error
    pub result: Result<T, E>,
    /// Attempts made (1 = succeeded or gave up on the first try)
    pub attempts: u32,
    /// Wall time spent, delays included
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry executor
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retry on every error
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_predicate(operation, |_| true).await
    }

    /// Retry only while `should_retry` accepts the error
    pub async fn run_with_predicate<F, Fut, T, E, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let start = std::time::Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match operation().await {
                Ok(value) => {
                    return RetryResult {
                        result: Ok(value),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }
                Err(e) => {
                    if attempts > self.config.max_retries || !should_retry(&e) {
                        return RetryResult {
                            result: Err(e),
                            attempts,
                            total_duration: start.elapsed(),
                        };
                    }

                    let delay = self.config.delay_for_attempt(attempts - 1);
                    tracing::debug!(
                        attempt = attempts,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying operation after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Whether a SQLite error is transient
pub fn is_retryable_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => {
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6), including extended codes
            let code = db_err.code().unwrap_or_default();
            code.parse::<i32>()
                .map(|c| matches!(c & 0xff, 5 | 6))
                .unwrap_or(false)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_calculation_without_jitter() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: 0.0,
            decorrelated_jitter: false,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn test_decorrelated_jitter_stays_in_bounds() {
        let config = RetryConfig::ledger();
        for attempt in 0..20 {
            let delay = config.delay_for_attempt(attempt);
            assert!(delay >= config.initial_delay);
            assert!(delay <= config.max_delay);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(RetryConfig::fast().with_max_retries(5));

        let result = retry
            .run(|| {
                let count = count.clone();
                async move {
                    if count.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(result.into_result().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_exhausts_retries() {
        let retry = Retry::new(RetryConfig::fast().with_max_retries(2));
        let result = retry.run(|| async { Err::<i32, _>("always fails") }).await;

        assert!(!result.is_success());
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn test_predicate_stops_on_fatal_error() {
        #[derive(Debug, PartialEq)]
        enum TestError {
            Retryable,
            Fatal,
        }

        let count = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(RetryConfig::fast().with_max_retries(5));

        let result: RetryResult<i32, TestError> = retry
            .run_with_predicate(
                || {
                    let count = count.clone();
                    async move {
                        if count.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(TestError::Retryable)
                        } else {
                            Err(TestError::Fatal)
                        }
                    }
                },
                |e| *e == TestError::Retryable,
            )
            .await;

        assert_eq!(result.attempts, 2);
        assert_eq!(result.into_result().unwrap_err(), TestError::Fatal);
    }

    #[test]
    fn test_retryable_db_errors() {
        assert!(is_retryable_db_error(&sqlx::Error::PoolTimedOut));
        assert!(!is_retryable_db_error(&sqlx::Error::RowNotFound));
        assert!(!is_retryable_db_error(&sqlx::Error::PoolClosed));
    }

    #[test]
    fn test_database_preset_retries_more_than_fast() {
        let db = RetryConfig::database();
        assert_eq!(db.max_retries, 5);
        assert!(db.max_retries > RetryConfig::fast().max_retries);
        assert!(db.decorrelated_jitter);
    }
}
