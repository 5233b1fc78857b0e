pub mod enrich;
pub mod health;
pub mod openapi;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use leadfit_core::Orchestrator;

use crate::metrics::Metrics;
use self::openapi::ApiDoc;

/// Upper bound on in-flight `/enrich` calls, sized independently of the
/// audit-store connection pool so a request burst queues at the
/// application layer instead of exhausting database connections (§5).
const MAX_CONCURRENT_ENRICH_REQUESTS: usize = 50;

/// Shared application state passed to every handler (§6).
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<Metrics>,
    /// Shared secret callers must present in `X-Api-Key` (§6 Ingress, §8).
    pub ingress_api_key: Arc<str>,
}

/// Build the full Axum router: `/enrich` requires `X-Api-Key` and is bounded
/// to `MAX_CONCURRENT_ENRICH_REQUESTS` in-flight calls; `/health` and
/// `/metrics` are always public and unbounded (§6).
///
/// Returns a state-free `Router` (`with_state` below resolves the generic
/// state parameter) so it can be handed directly to `axum::serve`.
pub fn router(state: AppState) -> Router {
    let enrich_routes = Router::new()
        .route("/enrich", post(enrich::enrich))
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_ENRICH_REQUESTS));

    Router::new()
        .merge(enrich_routes)
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
