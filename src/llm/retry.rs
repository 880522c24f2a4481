//! Exponential-backoff retry wrapper for a single LLM call attempt. Speaks
//! the typed `LlmError` taxonomy rather than `Box<dyn Error>`, so the
//! wrapper can tell a retryable 429/5xx apart from a permanent 4xx.

use std::fmt;
use std::time::{Duration as StdDuration, Instant};

use rand::{rng, Rng};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

use crate::error::LlmError;

/// Anything that can make one attempt at an LLM call.
pub trait AskAsync {
    type Response;
    #[allow(async_fn_in_trait)]
    async fn ask(&self, text: &str) -> Result<Self::Response, LlmError>;
}

/// Adds exponential backoff retry logic to any `AskAsync` implementation:
/// up to 3 attempts total, backoff starting at 1s, doubling, capped at 8s,
/// honoring an explicit `Retry-After` override when the inner error
/// carries one.
pub struct RetryAsk<T> {
    inner: T,
    max_attempts: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_attempts: 3,
            base_delay: StdDuration::from_secs(1),
            max_delay: StdDuration::from_secs(8),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, LlmError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_retryable() || attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "ask() giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff_delay(attempt, &e);
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> RetryAsk<T> {
    fn backoff_delay(&self, attempt: usize, err: &LlmError) -> StdDuration {
        if let LlmError::RateLimited(Some(retry_after_secs)) = err {
            return StdDuration::from_secs(*retry_after_secs);
        }
        let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FlakyThenOk {
        failures_left: AtomicUsize,
    }

    impl AskAsync for FlakyThenOk {
        type Response = String;
        async fn ask(&self, _text: &str) -> Result<Self::Response, LlmError> {
            if self.failures_left.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(LlmError::RateLimited(None))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    #[derive(Debug)]
    struct AlwaysPermanent;

    impl AskAsync for AlwaysPermanent {
        type Response = String;
        async fn ask(&self, _text: &str) -> Result<Self::Response, LlmError> {
            Err(LlmError::ApiError {
                status: 400,
                message: "bad request".into(),
            })
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let retry = RetryAsk::new(FlakyThenOk {
            failures_left: AtomicUsize::new(2),
        });
        let res = retry.ask("hello").await;
        assert_eq!(res.unwrap(), "ok");
    }

    #[tokio::test]
    async fn does_not_retry_permanent_4xx() {
        let retry = RetryAsk::new(AlwaysPermanent);
        let start = Instant::now();
        let res = retry.ask("hello").await;
        assert!(res.is_err());
        assert!(start.elapsed() < StdDuration::from_millis(500));
    }
}
