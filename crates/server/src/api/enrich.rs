use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use subtle::ConstantTimeEq;
use tracing::warn;

use leadfit_core::{EnrichResponse, LeadIdentity};

use crate::error::ServerError;

use super::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time comparison so response latency cannot leak how many
/// leading bytes of a guessed key were correct.
fn api_key_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// `POST /enrich` -- run the full enrichment pipeline for one lead (§4.4, §6).
///
/// The `X-Api-Key` header is checked before the request body is touched at
/// all (`Bytes` rather than `Json<LeadIdentity>`, so deserialization never
/// runs for an unauthenticated caller): a missing or wrong key never opens
/// an audit row (§8).
#[utoipa::path(
    post,
    path = "/enrich",
    tag = "Enrich",
    summary = "Enrich and score a lead",
    description = "Fans out to the places, company and web-tech adapters, scores the lead, projects CRM fields and writes them back if a crm_id is present.",
    request_body(content = LeadIdentity, description = "Lead identity to enrich"),
    responses(
        (status = 200, description = "Enrichment completed (possibly with no_data)", body = EnrichResponse),
        (status = 400, description = "Malformed body or failed identity validation"),
        (status = 401, description = "Missing or invalid X-Api-Key header"),
        (status = 503, description = "Request cancelled: deadline exceeded"),
    )
)]
pub async fn enrich(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented.is_empty() || !api_key_matches(presented, &state.ingress_api_key) {
        state.metrics.record_unauthorized();
        return Err(ServerError::Unauthorized);
    }

    let identity: LeadIdentity = serde_json::from_slice(&body).map_err(|e| {
        state.metrics.record_validation_rejected();
        ServerError::MalformedBody(e.to_string())
    })?;

    let response = state.orchestrator.enrich(identity).await.map_err(|err| {
        if matches!(err, leadfit_core::EnrichError::Validation(_)) {
            state.metrics.record_validation_rejected();
        }
        warn!(error = %err, "enrichment failed at the HTTP boundary");
        ServerError::from(err)
    })?;

    state.metrics.record_enrichment(response.enrichment_status, response.crm_update_status);

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_matches_requires_exact_equality() {
        assert!(api_key_matches("secret", "secret"));
        assert!(!api_key_matches("secre", "secret"));
        assert!(!api_key_matches("secrets", "secret"));
        assert!(!api_key_matches("", "secret"));
    }
}
