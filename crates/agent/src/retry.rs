use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_backoff(&self) -> Duration {
        let mut delay = self.initial_delay;
        let mut total = Duration::ZERO;
        for _ in 0..self.max_retries {
            total += delay;
            delay = next_retry_delay(delay, self);
        }
        total
    }
}

#[must_use]
pub fn is_retryable_status_code(status_code: u16) -> bool {
    matches!(status_code, 408 | 429 | 500 | 502 | 503 | 504)
}

fn next_retry_delay(current: Duration, retry_config: &RetryConfig) -> Duration {
    if current >= retry_config.max_delay {
        return retry_config.max_delay;
    }

    let multiplier = f64::from(retry_config.backoff_multiplier.max(1.0));
    let scaled = Duration::from_secs_f64(current.as_secs_f64() * multiplier);
    scaled.min(retry_config.max_delay)
}

pub async fn execute_with_retry<T, E, Op, Fut, Classify>(
    retry_config: &RetryConfig,
    operation_name: &'static str,
    classify_error: Classify,
    mut operation: Op,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Classify: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    let mut delay = retry_config.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < retry_config.max_retries && classify_error(&error) => {
                attempt += 1;
                warn!(
                    event_name = "provider.request.retry",
                    operation = operation_name,
                    attempt,
                    max_retries = retry_config.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "provider request failed with retryable error; retrying"
                );
                tokio::time::sleep(delay).await;
                delay = next_retry_delay(delay, retry_config);
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{execute_with_retry, is_retryable_status_code, RetryConfig};

    fn instant_retries(max_retries: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn retries_until_success_when_error_is_retryable() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<&str, String> =
            execute_with_retry(&instant_retries(2), "test", |_| true, || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("HTTP 503".to_string())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<(), String> =
            execute_with_retry(&instant_retries(5), "test", |_| false, || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("HTTP 401".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retryable_status_codes() {
        for status in [408, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status_code(status), "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status_code(status), "{status} should not be retryable");
        }
    }

    #[test]
    fn backoff_is_capped_by_max_delay() {
        let config = RetryConfig::default()
            .with_max_retries(4)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300));
        // 100 + 200 + 300 + 300
        assert_eq!(config.total_backoff(), Duration::from_millis(900));
    }
}
