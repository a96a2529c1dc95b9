use crate::{CoreError, LlmError, RedditApiError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Reddit content requests: 1s, 2s, 4s...
    pub fn reddit() -> Self {
        Self::default()
    }

    /// Generative API calls: 2s, 4s, 8s...
    pub fn anthropic() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Upper bound for any single wait, including server-dictated ones.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// How the executor reacts to a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a delay dictated by the server (Retry-After)
    RetryWithDelay(Duration),
    /// The credential was rejected; retry once immediately after it was dropped
    RefreshAuth,
    /// Don't retry (permanent failures)
    NoRetry,
}

pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::UnexpectedStatus { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            RedditApiError::InvalidToken => RetryStrategy::RefreshAuth,
            RedditApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            RedditApiError::InvalidResponse { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Llm(llm_error) => match llm_error {
            LlmError::RateLimitExceeded {
                retry_after: Some(seconds),
                ..
            } => RetryStrategy::RetryWithDelay(Duration::from_secs(*seconds)),
            LlmError::RateLimitExceeded { .. }
            | LlmError::ServiceUnavailable { .. }
            | LlmError::RequestTimeout { .. } => RetryStrategy::Retry,
            _ => RetryStrategy::NoRetry,
        },
        // Transport failures (connection reset, DNS, timeouts) are transient
        CoreError::Network(_) => RetryStrategy::Retry,
        _ => RetryStrategy::NoRetry,
    }
}

/// `base * multiplier^attempt`, capped at `max_delay`, plus optional jitter.
pub fn calculate_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let multiplier = policy.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (policy.base_delay.as_millis() as f64 * multiplier) as u64;
    let max_ms = policy.max_delay.as_millis() as u64;
    let exponential_delay = Duration::from_millis(delay_ms.min(max_ms));

    let jitter_range = (exponential_delay.as_millis() as f64 * policy.jitter_factor) as u64;
    let jitter = if jitter_range > 0 {
        fastrand::u64(0..=jitter_range)
    } else {
        0
    };

    (exponential_delay + Duration::from_millis(jitter)).min(policy.max_delay)
}

/// Runs an operation under a [`RetryPolicy`], classifying each failure with
/// [`get_retry_strategy`]. The last error is returned unchanged once attempts
/// run out.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        let mut auth_refreshed = false;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let strategy = get_retry_strategy(&error);

            // A rejected credential gets exactly one free retry; it does not
            // count against the attempt budget.
            if strategy == RetryStrategy::RefreshAuth {
                if !auth_refreshed {
                    auth_refreshed = true;
                    warn!(
                        "Credential rejected for {}, retrying with a fresh token",
                        operation_name
                    );
                    continue;
                }
                error!(
                    "Credential rejected again for {} after refresh: {}",
                    operation_name, error
                );
                return Err(error);
            }

            let has_attempts_left = attempt + 1 < max_attempts;
            let delay = match strategy {
                RetryStrategy::NoRetry => {
                    debug!(
                        "Not retrying {} due to error type: {}",
                        operation_name, error
                    );
                    return Err(error);
                }
                _ if !has_attempts_left => {
                    error!(
                        "Operation {} failed after {} attempts: {}",
                        operation_name, max_attempts, error
                    );
                    return Err(error);
                }
                RetryStrategy::RetryWithDelay(delay) => {
                    if delay > self.policy.max_delay {
                        warn!(
                            "{} asked to wait {:?}, capping at {:?}",
                            operation_name, delay, self.policy.max_delay
                        );
                    }
                    delay.min(self.policy.max_delay)
                }
                _ => calculate_delay(attempt, &self.policy),
            };

            warn!(
                "Attempt {}/{} for {} failed, retrying in {:?}: {}",
                attempt + 1,
                max_attempts,
                operation_name,
                delay,
                error
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_retry_policy_defaults() {
        let reddit = RetryPolicy::reddit();
        assert_eq!(reddit.max_attempts, 3);
        assert_eq!(reddit.base_delay, Duration::from_secs(1));

        let anthropic = RetryPolicy::anthropic();
        assert_eq!(anthropic.max_attempts, 3);
        assert_eq!(anthropic.base_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &policy), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &policy), Duration::from_millis(2000));
        assert_eq!(calculate_delay(2, &policy), Duration::from_millis(4000));
        assert_eq!(calculate_delay(3, &policy), Duration::from_millis(8000));
        assert_eq!(calculate_delay(10, &policy), Duration::from_millis(10000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &policy);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_retry_strategy_for_errors() {
        let rate_limited = CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 7 });
        assert_eq!(
            get_retry_strategy(&rate_limited),
            RetryStrategy::RetryWithDelay(Duration::from_secs(7))
        );

        let unauthorized = CoreError::RedditApi(RedditApiError::InvalidToken);
        assert_eq!(get_retry_strategy(&unauthorized), RetryStrategy::RefreshAuth);

        let auth_failed = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
            reason: "invalid_client".to_string(),
        });
        assert_eq!(get_retry_strategy(&auth_failed), RetryStrategy::NoRetry);

        let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
        assert_eq!(get_retry_strategy(&server_error), RetryStrategy::Retry);

        let overloaded = CoreError::Llm(LlmError::ServiceUnavailable {
            provider: "anthropic".to_string(),
            status_code: 529,
        });
        assert_eq!(get_retry_strategy(&overloaded), RetryStrategy::Retry);

        let bad_request = CoreError::Llm(LlmError::InvalidPrompt {
            reason: "max_tokens too large".to_string(),
        });
        assert_eq!(get_retry_strategy(&bad_request), RetryStrategy::NoRetry);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_policy());
        let result = executor
            .execute("test_operation", || async { Ok::<i32, CoreError>(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CoreError::RedditApi(RedditApiError::ServerError {
                            status_code: 500,
                        }))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, CoreError> = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::RedditApi(RedditApiError::ServerError {
                        status_code: 502,
                    }))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_on_permanent_error() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<i32, CoreError> = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::Llm(LlmError::InvalidPrompt {
                        reason: "bad".to_string(),
                    }))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_refresh_is_free_but_only_once() {
        let executor = RetryExecutor::new(fast_policy().with_max_attempts(1));
        let calls = Arc::new(AtomicU32::new(0));

        // One 401 then success: allowed even with a single-attempt budget.
        let result = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CoreError::RedditApi(RedditApiError::InvalidToken))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Two 401s in a row: give up after the second.
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<&str, CoreError> = RetryExecutor::new(fast_policy())
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::RedditApi(RedditApiError::InvalidToken))
                }
            })
            .await;
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::InvalidToken))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_delay_is_honoured() {
        let executor = RetryExecutor::new(RetryPolicy::reddit());
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                            retry_after: 5,
                        }))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_delay_is_capped_at_max_delay() {
        let policy = RetryPolicy::reddit().with_max_delay(Duration::from_secs(30));
        let executor = RetryExecutor::new(policy);
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let result = executor
            .execute("test_operation", || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                            retry_after: 86_400,
                        }))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(31));
    }
}
