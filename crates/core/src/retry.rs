use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Bounded exponential backoff policy around a fallible operation (C1, §4.1).
///
/// `retry` is iterative, not recursive, so a persistently failing operation
/// cannot overflow the stack (§9 — this replaces a recursive retry helper
/// found in older source material).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self { max_attempts, initial_delay, max_delay, multiplier }
    }

    /// `delay = min(initial_delay * multiplier^attempt, max_delay)`, where
    /// `attempt` is the zero-based count of attempts already made.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let raw = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }
}

/// Error surfaced by [`retry`] once its attempt budget is exhausted, or when
/// the supplied cancellation token fires mid-sleep.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("operation failed after exhausting retry budget: {0}")]
    Exhausted(E),
    #[error("operation cancelled")]
    Cancelled,
}

impl<E> RetryError<E> {
    #[must_use]
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}

/// Execute `op` up to `policy.max_attempts` times, sleeping between attempts
/// per [`RetryPolicy::delay_for`]. Returns the first success, or
/// [`RetryError::Exhausted`] carrying the last error once attempts run out.
/// Cancelling `cancel` aborts an in-flight sleep and fails the call with
/// [`RetryError::Cancelled`] (§4.1).
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }

        let is_last_attempt = attempt + 1 == policy.max_attempts;
        if is_last_attempt {
            break;
        }

        let delay = policy.delay_for(attempt);
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
        }
    }

    Err(RetryError::Exhausted(last_err.expect("loop runs at least once")))
}
