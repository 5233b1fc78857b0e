use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Per-source three-state failure gate (C2, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub monitoring_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_secs(60),
        }
    }
}

/// A point-in-time snapshot of a breaker's state, for `GET /health` (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CircuitBreakerStatus {
    pub source: String,
    pub state: String,
    pub failure_count_in_window: usize,
    pub trip_count: u64,
}

struct Inner {
    state: BreakerState,
    /// Timestamps of failures observed in `Closed` state, pruned to
    /// `now - monitoring_window` on every decision (§4.2, §9 — no background
    /// timers, the window is a plain pruned list).
    failures: Vec<Instant>,
    last_failure_time: Option<Instant>,
    /// `true` while the single admitted `HalfOpen` probe is in flight.
    half_open_probe_in_flight: bool,
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    /// The circuit is open (or a probe is already in flight); the operation
    /// was never invoked.
    #[error("circuit breaker open")]
    Open,
    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

/// Per-source circuit breaker instance (§4.2, §5 — one per source, shared
/// across requests; all state mutations are serialized per breaker by the
/// internal mutex).
pub struct CircuitBreaker {
    source: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    /// Total number of `Closed`/`HalfOpen` -> `Open` transitions over the
    /// breaker's lifetime, exposed for the `/metrics` Prometheus endpoint
    /// (§6). Plain atomic: it's a monotonic counter, not part of the
    /// serialized state-transition decision.
    trip_count: AtomicU64,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(source: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            source: source.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failures: Vec::new(),
                last_failure_time: None,
                half_open_probe_in_flight: false,
            }),
            trip_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Total number of times this breaker has tripped open (§6 `/metrics`).
    #[must_use]
    pub fn trip_count(&self) -> u64 {
        self.trip_count.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> CircuitBreakerStatus {
        let mut inner = self.inner.lock().await;
        self.prune(&mut inner);
        CircuitBreakerStatus {
            source: self.source.clone(),
            state: inner.state.to_string(),
            failure_count_in_window: inner.failures.len(),
            trip_count: self.trip_count(),
        }
    }

    fn prune(&self, inner: &mut Inner) {
        let window = self.config.monitoring_window;
        let now = Instant::now();
        inner.failures.retain(|t| now.duration_since(*t) < window);
    }

    /// Acquire permission to make one call. Returns `true` if the call may
    /// proceed; as a side effect, may transition `Open` -> `HalfOpen` when the
    /// reset timeout has elapsed, reserving the single probe slot.
    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        self.prune(&mut inner);

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed_since_failure = inner
                    .last_failure_time
                    .map(|t| t.elapsed() >= self.config.reset_timeout)
                    .unwrap_or(false);
                if elapsed_since_failure {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    info!(source = %self.source, "circuit breaker transitioning to half-open");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    false
                } else {
                    inner.half_open_probe_in_flight = true;
                    true
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != BreakerState::Closed {
            info!(source = %self.source, "circuit breaker closing after successful probe");
        }
        inner.state = BreakerState::Closed;
        inner.failures.clear();
        inner.half_open_probe_in_flight = false;
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        inner.last_failure_time = Some(now);
        inner.half_open_probe_in_flight = false;

        match inner.state {
            BreakerState::HalfOpen => {
                warn!(source = %self.source, "half-open probe failed, reopening circuit");
                inner.state = BreakerState::Open;
                self.trip_count.fetch_add(1, Ordering::Relaxed);
            }
            BreakerState::Closed => {
                inner.failures.push(now);
                self.prune(&mut inner);
                if inner.failures.len() >= self.config.failure_threshold as usize {
                    warn!(
                        source = %self.source,
                        threshold = self.config.failure_threshold,
                        "circuit breaker opening"
                    );
                    inner.state = BreakerState::Open;
                    self.trip_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Run `op` through the breaker. Per §4.3, retry wraps the raw call and
    /// the breaker wraps the *entire retried sequence* as a single logical
    /// call, so transient failures absorbed by retry don't each separately
    /// count against the breaker's rolling window.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.try_acquire().await {
            return Err(BreakerError::Open);
        }

        match op().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure().await;
                Err(BreakerError::Inner(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_millis(20),
            monitoring_window: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("places", fast_config());
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.status().await.state, "open");
        assert_eq!(breaker.trip_count(), 1);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_invoking_op() {
        let breaker = CircuitBreaker::new("places", fast_config());
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }

        let mut invoked = false;
        let result = breaker
            .call(|| {
                invoked = true;
                async { Ok::<_, &str>(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn half_open_after_reset_timeout_closes_on_success() {
        let breaker = CircuitBreaker::new("places", fast_config());
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.status().await.state, "open");

        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = breaker.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.status().await.state, "closed");
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("places", fast_config());
        for _ in 0..3 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = breaker.call(|| async { Err::<(), _>("still broken") }).await;
        assert!(result.is_err());
        assert_eq!(breaker.status().await.state, "open");
    }

    #[tokio::test]
    async fn failures_outside_monitoring_window_are_pruned() {
        let config = CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
            monitoring_window: Duration::from_millis(20),
        };
        let breaker = CircuitBreaker::new("places", config);
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;

        // Only one failure should remain in the pruned window.
        assert_eq!(breaker.status().await.state, "closed");
    }
}
