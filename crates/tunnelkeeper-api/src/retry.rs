// ── Retry strategies ──
//
// Every backend call takes a caller-chosen strategy. `Default` retries
// transient failures with exponential backoff; nothing else is retried.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Retry policy applied to a single backend call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Fail on the first error.
    #[serde(rename = "none")]
    NoRetry,
    /// Retry transient failures with exponential backoff.
    #[default]
    Default,
}

impl RetryStrategy {
    /// Maximum number of retries after the first attempt.
    pub fn max_retries(self) -> u32 {
        match self {
            Self::NoRetry => 0,
            Self::Default => DEFAULT_MAX_RETRIES,
        }
    }

    /// Delay before the `attempt`-th retry (1-based).
    pub fn delay_for(self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        DEFAULT_INITIAL_DELAY
            .saturating_mul(factor)
            .min(DEFAULT_MAX_DELAY)
    }
}

/// Run `f` until it succeeds, fails permanently, or retries are exhausted.
pub async fn with_retry<T, F, Fut>(strategy: RetryStrategy, mut f: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < strategy.max_retries() && e.is_transient() => {
                attempt += 1;
                let delay = strategy.delay_for(attempt);
                warn!(attempt, ?delay, error = %e, "transient backend failure, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn unavailable() -> Error {
        Error::Server {
            status: 503,
            code: None,
            message: "unavailable".into(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let s = RetryStrategy::Default;
        assert_eq!(s.delay_for(1), Duration::from_secs(1));
        assert_eq!(s.delay_for(2), Duration::from_secs(2));
        assert_eq!(s.delay_for(3), Duration::from_secs(4));
        assert_eq!(s.delay_for(10), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn default_strategy_retries_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(RetryStrategy::Default, || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn default_strategy_gives_up_after_three_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), Error> = with_retry(RetryStrategy::Default, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn no_retry_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), Error> = with_retry(RetryStrategy::NoRetry, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), Error> = with_retry(RetryStrategy::Default, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Server {
                    status: 400,
                    code: Some("INVALID_ACCOUNT".into()),
                    message: "bad request".into(),
                })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().api_error_code(), Some("INVALID_ACCOUNT"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn strategy_deserializes_from_config_names() {
        let s: RetryStrategy = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(s, RetryStrategy::NoRetry);
        let s: RetryStrategy = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(s, RetryStrategy::Default);
    }
}
