use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often, and how patiently, a failed generator call is repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    /// One retry after five seconds
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are used up.
    ///
    /// `on_retry` is called with the failed attempt number (1-based) and its
    /// error before each pause. Returns the value and the number of attempts
    /// it took, or the last error. At least one attempt is always made.
    pub async fn run<T, E, F, Fut, R>(&self, mut op: F, mut on_retry: R) -> Result<(T, usize), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(usize, &E),
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok((value, attempt)),
                Err(error) if attempt < attempts => {
                    on_retry(attempt, &error);
                    debug!(attempt, delay_ms = self.delay.as_millis(), "Retrying after failure");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    #[tokio::test]
    async fn test_first_success_needs_no_retry() {
        let policy = RetryPolicy::new(2, Duration::from_secs(60));
        let retries = Cell::new(0);

        let result: Result<(&str, usize), String> = policy
            .run(|| async { Ok("ok") }, |_, _| retries.set(retries.get() + 1))
            .await;

        assert_eq!(result.unwrap(), ("ok", 1));
        assert_eq!(retries.get(), 0);
    }

    #[tokio::test]
    async fn test_retries_once_after_delay() {
        let policy = RetryPolicy::new(2, Duration::from_millis(20));
        let calls = Cell::new(0);
        let start = Instant::now();

        let result = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n == 1 {
                            Err("boom")
                        } else {
                            Ok(n)
                        }
                    }
                },
                |attempt, error| {
                    assert_eq!(attempt, 1);
                    assert_eq!(*error, "boom");
                },
            )
            .await;

        assert_eq!(result.unwrap(), (2, 2));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let calls = Cell::new(0);

        let result: Result<((), usize), String> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { Err(format!("failure {}", n)) }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        let calls = Cell::new(0);

        let result: Result<((), usize), &str> = policy
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err("no") }
                },
                |_, _| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }
}
