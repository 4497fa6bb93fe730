//! Polling with exponential backoff under an overall deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Result};

/// Shortest sleep between two attempts.
pub const MIN_POLL_DELAY: Duration = Duration::from_millis(10);

/// Outcome of one polled attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// Not there yet, poll again.
    Pending,
    Done(T),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    timeout: Duration,
    initial_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Delays of 1s, 2s, 4s, ... capped at 10s.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Delays below [`MIN_POLL_DELAY`] are raised to it.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay.max(MIN_POLL_DELAY);
        self
    }

    /// Factors below 1 are treated as 1.
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay.max(MIN_POLL_DELAY);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_delay)
            .clamp(MIN_POLL_DELAY, self.max_delay)
    }
}

/// Calls `operation` until it returns [`Attempt::Done`], sleeping between
/// attempts. The total wait never exceeds the policy's timeout: the last
/// sleep is cut short at the deadline and a final attempt still pending
/// fails with [`Error::Timeout`]. A timeout too large to be represented as
/// an instant never expires. Errors from `operation` are returned as is.
pub async fn poll_until<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let deadline = Instant::now().checked_add(policy.timeout);
    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Attempt::Done(value) = operation().await? {
            return Ok(value);
        }
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    tracing::debug!("gave up after {} attempts", attempts);
                    return Err(Error::Timeout(policy.timeout));
                }
                delay.min(deadline - now)
            }
            None => delay,
        };
        tracing::debug!("attempt {} pending, retrying in {:?}", attempts, wait);
        tokio::time::sleep(wait).await;
        delay = policy.next_delay(delay);
    }
}
