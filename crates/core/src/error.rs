use thiserror::Error;

use crate::identity::IdentityValidationError;

/// Errors a source adapter (C3) may surface to the orchestrator. Adapters
/// convert empty results to `Ok(None)`, never an error (§4.3, §7) — these
/// variants are reserved for conditions the orchestrator must isolate.
#[derive(Debug, Error, Clone)]
pub enum SourceError {
    /// HTTP 5xx / network failure; retried by C1.
    #[error("source-transient error: {0}")]
    Transient(String),
    /// The per-source hard timeout elapsed.
    #[error("source timed out")]
    Timeout,
    /// The circuit breaker is open; no call was attempted.
    #[error("source unavailable (circuit open)")]
    Unavailable,
}

impl SourceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout)
    }
}

/// Errors the CRM writer (C7) may surface. Never fatal to the enclosing
/// request (§4.4 step 5, §7) — the orchestrator records `crm_update_status`
/// and moves on.
#[derive(Debug, Error, Clone)]
pub enum CrmError {
    #[error("crm id does not match the expected format")]
    InvalidId,
    #[error("crm session expired")]
    SessionExpired,
    #[error("crm-transient error: {0}")]
    Transient(String),
    #[error("crm-fatal error: {0}")]
    Fatal(String),
}

impl CrmError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::SessionExpired)
    }
}

/// Errors from the audit store adapter. Logged but never propagated to the
/// caller (§4.4, §7 — "graceful degradation of the audit trail").
#[derive(Debug, Error, Clone)]
pub enum AuditStoreError {
    #[error("audit storage error: {0}")]
    Storage(String),
    #[error("audit row invariant violated: {0}")]
    InvariantViolation(String),
}

/// The final terminal status written to an [`crate::audit::AuditRow`] and
/// returned as `enrichment_status` in the HTTP response (§3, §4.4 step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Row opened, pipeline still running.
    Pending,
    /// Reserved terminal value (not reached by the current C4 step-6 table,
    /// kept for storage-layer forward compatibility per §3's six-value enum).
    Success,
    /// Reserved terminal value; see `Success`.
    Partial,
    /// Scoring failed (should be unreachable — scoring is total).
    Failed,
    /// At least one adapter produced facts and scoring succeeded.
    Completed,
    /// No facts from any adapter.
    NoData,
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::NoData => "no_data",
        };
        write!(f, "{s}")
    }
}

/// Fatal, request-level errors that surface to the HTTP boundary as a
/// non-2xx response (§7 — validation, cancellation, and unreachable scoring
/// errors are the only ones that do).
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("validation error: {0}")]
    Validation(#[from] IdentityValidationError),
    #[error("request cancelled or deadline exceeded")]
    Cancelled,
    /// Should be unreachable: scoring is a total function.
    #[error("scoring error: {0}")]
    Scoring(String),
}
