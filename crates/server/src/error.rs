//! Maps internal error types to the HTTP boundary exactly once (§7:
//! "The HTTP boundary maps this enum to status codes and a `{"error": "..."}`
//! JSON body exactly once, at the outermost layer").

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use leadfit_core::{EnrichError, IdentityValidationError};
use thiserror::Error;

/// Errors surfaced by the HTTP layer itself, before or around a call into
/// the orchestrator (§7, §8).
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or blank `X-Api-Key` header (§6, §8).
    #[error("missing or invalid X-Api-Key header")]
    Unauthorized,
    /// Request body failed to deserialize into a `LeadIdentity` (§7 `validation`).
    #[error("request body is not a valid LeadIdentity: {0}")]
    MalformedBody(String),
    /// `LeadIdentity` failed its own validation (§7 `validation`).
    #[error(transparent)]
    Validation(#[from] IdentityValidationError),
    /// The pipeline was cancelled (deadline exceeded or caller abort) (§7 `cancellation`).
    #[error("enrichment cancelled: deadline exceeded")]
    Cancelled,
    /// Should be unreachable: scoring is a total function (§7 `scoring`).
    #[error("internal scoring error: {0}")]
    Scoring(String),
}

impl From<EnrichError> for ServerError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::Validation(e) => Self::Validation(e),
            EnrichError::Cancelled => Self::Cancelled,
            EnrichError::Scoring(msg) => Self::Scoring(msg),
        }
    }
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MalformedBody(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Scoring(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
