use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{AuditStoreError, EnrichmentStatus};
use crate::facts::{CompanyFacts, PlacesFacts, WebTechFacts};
use crate::projection::CrmProjection;
use crate::score::ScoreBreakdown;

/// One persisted row per enrichment attempt, progressively updated as
/// pipeline stages complete (§3 "Lifecycle").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AuditRow {
    pub id: String,
    pub lead_id: Option<String>,
    pub crm_id: Option<String>,
    /// Opaque 128-bit hex token generated at the start of the pipeline (§4.4 step 1).
    pub job_id: String,
    pub status: EnrichmentStatus,
    #[serde(default)]
    pub places_facts: Option<PlacesFacts>,
    #[serde(default)]
    pub company_facts: Option<CompanyFacts>,
    #[serde(default)]
    pub webtech_facts: Option<WebTechFacts>,
    #[serde(default)]
    pub fit_score: Option<u8>,
    #[serde(default)]
    pub score_breakdown: Option<ScoreBreakdown>,
    #[serde(default)]
    pub projection: Option<CrmProjection>,
    pub crm_updated: bool,
    #[serde(default)]
    pub crm_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to open a new [`AuditRow`] (§4.4 step 2).
///
/// Storage-layer invariant (§3): at least one of `lead_id` or `crm_id` must
/// be set. Enforced by every [`AuditStore`] implementation's `create`.
#[derive(Debug, Clone)]
pub struct NewAuditRow {
    pub lead_id: Option<String>,
    pub crm_id: Option<String>,
    pub job_id: String,
}

/// Storage interface for the audit trail (§3, §4.4, §5 — bounded connection
/// pool is an implementation detail of the concrete backend, not this trait).
///
/// An [`AuditRow`] is never deleted by the core; garbage collection is an
/// external concern.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn create(&self, new_row: NewAuditRow) -> Result<AuditRow, AuditStoreError>;
    async fn update_places(&self, id: &str, facts: &PlacesFacts) -> Result<(), AuditStoreError>;
    async fn update_company(&self, id: &str, facts: &CompanyFacts) -> Result<(), AuditStoreError>;
    async fn update_webtech(&self, id: &str, facts: &WebTechFacts) -> Result<(), AuditStoreError>;
    async fn update_score(
        &self,
        id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
    ) -> Result<(), AuditStoreError>;
    async fn update_projection(&self, id: &str, projection: &CrmProjection) -> Result<(), AuditStoreError>;
    async fn update_crm_result(&self, id: &str, updated: bool) -> Result<(), AuditStoreError>;
    /// Writes the terminal status, strictly last in the per-request ordering (§5).
    async fn finalize(
        &self,
        id: &str,
        status: EnrichmentStatus,
        error: Option<&str>,
    ) -> Result<(), AuditStoreError>;
    async fn get(&self, id: &str) -> Result<Option<AuditRow>, AuditStoreError>;
}
