use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default end-to-end deadline for the whole pipeline (§5).
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(60);

/// Per-request cancellation and deadline context (§5).
///
/// Carries a hard deadline and a cancel signal that propagate to all
/// in-flight adapters; an exceeded deadline or a caller-abort both surface
/// through the same [`CancellationToken`], so adapters never need to
/// distinguish the two.
#[derive(Clone)]
pub struct RequestContext {
    cancel: CancellationToken,
    _deadline_guard: std::sync::Arc<tokio::task::JoinHandle<()>>,
}

impl RequestContext {
    /// Start a new context whose cancel token fires automatically once
    /// `deadline` elapses, in addition to being cancellable manually via
    /// [`RequestContext::cancel`].
    #[must_use]
    pub fn with_deadline(deadline: Duration) -> Self {
        let cancel = CancellationToken::new();
        let timer_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(deadline) => timer_cancel.cancel(),
                () = timer_cancel.cancelled() => {}
            }
        });
        Self {
            cancel,
            _deadline_guard: std::sync::Arc::new(handle),
        }
    }

    #[must_use]
    pub fn default_deadline() -> Self {
        Self::with_deadline(DEFAULT_REQUEST_DEADLINE)
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Signal a caller-initiated abort. Equivalent in effect to the deadline
    /// elapsing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A child token scoped to a single adapter call, so that adapter *i*'s
    /// own per-source timeout can fire independently without affecting
    /// adapter *j* (§4.4 isolation).
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_token_after_elapsed_time() {
        let ctx = RequestContext::with_deadline(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());
        tokio::time::sleep(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn manual_cancel_fires_token() {
        let ctx = RequestContext::with_deadline(Duration::from_secs(60));
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }
}
