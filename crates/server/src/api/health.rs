use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Json, response::Response};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub breakers: Vec<leadfit_core::CircuitBreakerStatus>,
}

/// `GET /health` -- service status plus the three source breakers' current
/// state (§6: "health reports circuit breaker states"). Always public.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    description = "Returns service status and the current state of each source adapter's circuit breaker.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let breakers = state.orchestrator.breaker_statuses().await;
    let body = HealthResponse { status: "ok".to_owned(), breakers };
    (StatusCode::OK, Json(body))
}

/// `GET /metrics` -- Prometheus text exposition of request and breaker
/// counters (§6). Always public.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    summary = "Prometheus metrics",
    description = "Returns request, enrichment-status, CRM-outcome and circuit-breaker counters in Prometheus text exposition format.",
    responses(
        (status = 200, description = "Current counters", content_type = "text/plain")
    )
)]
pub async fn metrics(State(state): State<AppState>) -> Response {
    let breakers = state.orchestrator.breaker_statuses().await;
    let body = state.metrics.render(&breakers);
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response()
}
