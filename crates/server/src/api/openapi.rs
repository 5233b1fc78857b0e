use leadfit_core::{CrmProjection, EnrichResponse, LeadIdentity, ScoreBreakdown};

use super::enrich;
use super::health::{self, HealthResponse};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Lead-Fit Enrichment Engine API",
        version = "0.1.0",
        description = "Webhook-driven lead enrichment, scoring and CRM write-back service.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Enrich", description = "Lead enrichment and scoring"),
        (name = "Health", description = "Service health and metrics"),
    ),
    paths(enrich::enrich, health::health, health::metrics),
    components(schemas(LeadIdentity, EnrichResponse, ScoreBreakdown, CrmProjection, HealthResponse))
)]
pub struct ApiDoc;
