use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::adapter::{CrmWriter, SourceAdapter};
use crate::audit::{AuditStore, NewAuditRow};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use crate::context::RequestContext;
use crate::error::{EnrichError, EnrichmentStatus, SourceError};
use crate::facts::{CompanyFacts, EnrichmentRecord, PlacesFacts, WebTechFacts};
use crate::identity::LeadIdentity;
use crate::projection::{self, CrmProjection};
use crate::retry::{self, RetryPolicy};
use crate::score::{self, ScoreBreakdown};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Whether the CRM update (if attempted) succeeded, failed, or was never
/// attempted because the identity carried no CRM id (§4.4 step 5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CrmUpdateStatus {
    Skipped,
    Success,
    Failed,
}

/// The shaped response returned at the HTTP boundary (§6): `{enrichment_status,
/// fit_score, score_breakdown, <nine projected fields>, crm_update_status,
/// request_id, enrichment_timestamp}`. The nine projected fields are flattened
/// onto the top level rather than nested, matching the documented wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EnrichResponse {
    pub enrichment_status: EnrichmentStatus,
    pub fit_score: u8,
    pub score_breakdown: ScoreBreakdown,
    #[serde(flatten)]
    pub projection: CrmProjection,
    pub crm_update_status: CrmUpdateStatus,
    pub request_id: String,
    pub audit_id: String,
    /// Whether the audit row write path succeeded end-to-end (§7 `audit-store`
    /// error policy: audit errors are logged, never fatal, and surfaced here).
    pub audit_persisted: bool,
    pub enrichment_timestamp: chrono::DateTime<chrono::Utc>,
}

/// One per-source pipeline: adapter + its dedicated breaker + retry policy,
/// wired so retry is innermost and the breaker gates the whole retried
/// sequence as one call (§4.3).
pub struct SourcePipeline<Facts> {
    adapter: Arc<dyn SourceAdapter<Facts> + Send + Sync>,
    breaker: Arc<CircuitBreaker>,
    retry_policy: RetryPolicy,
}

impl<Facts> SourcePipeline<Facts> {
    #[must_use]
    pub fn new(
        adapter: Arc<dyn SourceAdapter<Facts> + Send + Sync>,
        breaker: Arc<CircuitBreaker>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self { adapter, breaker, retry_policy }
    }

    /// The pipeline's breaker, for status reporting (`GET /health`, §6).
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run the pipeline. Always isolated: a breaker-open rejection, an
    /// exhausted retry budget, or an empty upstream result all collapse to
    /// `None` here so that one failing source can never affect another
    /// (§4.4 step 3).
    async fn run(&self, identity: &LeadIdentity, ctx: &RequestContext) -> Option<Facts> {
        let cancel = ctx.child_token();
        let call = self.breaker.call(|| async {
            retry::retry(&self.retry_policy, &cancel, |_attempt| {
                self.adapter.enrich(identity, ctx)
            })
            .await
        });

        // Races the whole breaker-gated, retried call against the request's
        // cancellation token so an exceeded deadline or caller abort
        // interrupts in-flight work at this layer too, even if an adapter's
        // own `enrich` implementation didn't observe `ctx` itself (§5(c)).
        // Dropping `call` on the cancelled branch drops the in-flight
        // adapter future.
        let result = tokio::select! {
            result = call => result,
            () = ctx.token().cancelled() => {
                warn!(source = self.adapter.source_name(), "source adapter isolated after cancellation");
                return None;
            }
        };

        match result {
            Ok(Some(facts)) => Some(facts),
            Ok(None) => None,
            Err(err) => {
                let reason = match err {
                    crate::circuit_breaker::BreakerError::Open => "circuit open".to_owned(),
                    crate::circuit_breaker::BreakerError::Inner(retry_err) => retry_err
                        .into_inner()
                        .map_or_else(|| "cancelled".to_owned(), |e: SourceError| e.to_string()),
                };
                warn!(source = self.adapter.source_name(), reason, "source adapter isolated after failure");
                None
            }
        }
    }
}

fn generate_job_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Apply the precedence rule for fields present on both the input identity
/// and `PlacesFacts` (§4.4): input wins unless `overwrite_address_hint` is
/// set, in which case Places wins for website/phone/city/state.
fn effective_identity(identity: &LeadIdentity, places: Option<&PlacesFacts>) -> LeadIdentity {
    let mut effective = identity.clone();
    let Some(places) = places else { return effective };
    if !places.overwrite_address_hint {
        return effective;
    }
    if let Some(website) = &places.website {
        effective.website = Some(website.clone());
    }
    if let Some(phone) = &places.phone {
        effective.phone = Some(phone.clone());
    }
    if let Some(locality) = &places.locality {
        effective.city = Some(locality.clone());
    }
    effective
}

/// Enrichment orchestrator (C4, §4.4). Owns the wiring between the three
/// source pipelines, the scorer, the projector, the CRM writer and the audit
/// store for the lifetime of a single request.
pub struct Orchestrator {
    places: SourcePipeline<PlacesFacts>,
    company: SourcePipeline<CompanyFacts>,
    webtech: SourcePipeline<WebTechFacts>,
    crm_writer: Arc<dyn CrmWriter + Send + Sync>,
    crm_retry: RetryPolicy,
    audit_store: Arc<dyn AuditStore + Send + Sync>,
    request_deadline: std::time::Duration,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        places: SourcePipeline<PlacesFacts>,
        company: SourcePipeline<CompanyFacts>,
        webtech: SourcePipeline<WebTechFacts>,
        crm_writer: Arc<dyn CrmWriter + Send + Sync>,
        audit_store: Arc<dyn AuditStore + Send + Sync>,
        request_deadline: std::time::Duration,
    ) -> Self {
        Self {
            places,
            company,
            webtech,
            crm_writer,
            crm_retry: RetryPolicy::new(3, std::time::Duration::from_secs(1), std::time::Duration::from_secs(10), 2.0),
            audit_store,
            request_deadline,
        }
    }

    /// Run the full pipeline for one validated identity (§4.4).
    #[instrument(skip_all, fields(business_name = %identity.business_name))]
    pub async fn enrich(&self, mut identity: LeadIdentity) -> Result<EnrichResponse, EnrichError> {
        identity.validate()?;

        let job_id = generate_job_id();
        let ctx = RequestContext::with_deadline(self.request_deadline);

        let mut audit_persisted = true;
        let audit_row = self
            .audit_store
            .create(NewAuditRow {
                lead_id: Some(identity.external_id.clone()),
                crm_id: identity.crm_id.clone(),
                job_id: job_id.clone(),
            })
            .await;
        let audit_id = match audit_row {
            Ok(row) => row.id,
            Err(err) => {
                warn!(error = %err, "failed to open audit row, continuing without audit persistence");
                audit_persisted = false;
                job_id.clone()
            }
        };

        if ctx.is_cancelled() {
            if audit_persisted {
                self.finalize_audit(&audit_id, EnrichmentStatus::Failed, Some("cancelled")).await;
            }
            return Err(EnrichError::Cancelled);
        }

        // Fan out: three adapters run concurrently, each isolated by its own
        // breaker+retry pipeline. `tokio::join!` waits for all three to
        // settle regardless of individual failure (§4.4 step 3, §5).
        let (places_facts, company_facts, webtech_facts) = tokio::join!(
            self.places.run(&identity, &ctx),
            self.company.run(&identity, &ctx),
            self.webtech.run(&identity, &ctx),
        );

        if let Some(facts) = &places_facts
            && audit_persisted
            && let Err(err) = self.audit_store.update_places(&audit_id, facts).await
        {
            warn!(error = %err, "audit update_places failed");
        }
        if let Some(facts) = &company_facts
            && audit_persisted
            && let Err(err) = self.audit_store.update_company(&audit_id, facts).await
        {
            warn!(error = %err, "audit update_company failed");
        }
        if let Some(facts) = &webtech_facts
            && audit_persisted
            && let Err(err) = self.audit_store.update_webtech(&audit_id, facts).await
        {
            warn!(error = %err, "audit update_webtech failed");
        }

        let record = EnrichmentRecord {
            places: places_facts,
            company: company_facts,
            webtech: webtech_facts,
        };

        let resolved_identity = effective_identity(&identity, record.places.as_ref());

        if ctx.is_cancelled() {
            if audit_persisted {
                self.finalize_audit(&audit_id, EnrichmentStatus::Failed, Some("deadline exceeded")).await;
            }
            return Err(EnrichError::Cancelled);
        }

        // Scoring and projection are pure and total (C5/C6); there is no
        // fallible path here today, but the status table in §4.4 step 6
        // reserves `Failed` for the (unreachable) case where they fail.
        let breakdown = score::score(&resolved_identity, &record);
        let projection = projection::project(&resolved_identity, &record);

        if audit_persisted
            && let Err(err) = self
                .audit_store
                .update_score(&audit_id, breakdown.final_score, &breakdown)
                .await
        {
            warn!(error = %err, "audit update_score failed");
        }
        if audit_persisted
            && let Err(err) = self.audit_store.update_projection(&audit_id, &projection).await
        {
            warn!(error = %err, "audit update_projection failed");
        }

        let crm_update_status = if let Some(crm_id) = &identity.crm_id {
            match self.write_crm(crm_id, breakdown.final_score, &breakdown, &projection, &ctx).await {
                Ok(()) => {
                    if audit_persisted
                        && let Err(err) = self.audit_store.update_crm_result(&audit_id, true).await
                    {
                        warn!(error = %err, "audit update_crm_result failed");
                    }
                    CrmUpdateStatus::Success
                }
                Err(err) => {
                    warn!(error = %err, "crm update failed (non-fatal)");
                    if audit_persisted
                        && let Err(err) = self.audit_store.update_crm_result(&audit_id, false).await
                    {
                        warn!(error = %err, "audit update_crm_result failed");
                    }
                    CrmUpdateStatus::Failed
                }
            }
        } else {
            CrmUpdateStatus::Skipped
        };

        let terminal_status = if record.is_empty() {
            EnrichmentStatus::NoData
        } else {
            EnrichmentStatus::Completed
        };

        if audit_persisted {
            self.finalize_audit(&audit_id, terminal_status, None).await;
        }

        info!(status = %terminal_status, score = breakdown.final_score, "enrichment complete");

        Ok(EnrichResponse {
            enrichment_status: terminal_status,
            fit_score: breakdown.final_score,
            score_breakdown: breakdown,
            projection,
            crm_update_status,
            request_id: job_id,
            audit_id,
            audit_persisted,
            enrichment_timestamp: chrono::Utc::now(),
        })
    }

    async fn write_crm(
        &self,
        crm_id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
        projection: &CrmProjection,
        ctx: &RequestContext,
    ) -> Result<(), crate::error::CrmError> {
        let cancel = ctx.child_token();
        retry::retry(&self.crm_retry, &cancel, |_attempt| {
            self.crm_writer.update(crm_id, score, breakdown, projection)
        })
        .await
        .map_err(|e| e.into_inner().unwrap_or(crate::error::CrmError::SessionExpired))
    }

    async fn finalize_audit(&self, audit_id: &str, status: EnrichmentStatus, error: Option<&str>) {
        if let Err(err) = self.audit_store.finalize(audit_id, status, error).await {
            warn!(error = %err, "audit finalize failed");
        }
    }

    /// Snapshot the state of all three per-source circuit breakers, for
    /// `GET /health` (§6: "reports... the current state of each of the
    /// three circuit breakers, without requiring authentication").
    pub async fn breaker_statuses(&self) -> Vec<CircuitBreakerStatus> {
        vec![
            self.places.breaker().status().await,
            self.company.breaker().status().await,
            self.webtech.breaker().status().await,
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::audit::AuditRow;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::facts::{CompanyFacts, PlacesFacts, WebTechFacts};

    /// A [`SourceAdapter`] that always returns the same canned result, for
    /// wiring up end-to-end orchestrator fixtures (§8 "concrete scenarios").
    struct FixedAdapter<Facts> {
        name: &'static str,
        result: Result<Option<Facts>, SourceError>,
    }

    #[async_trait]
    impl<Facts: Clone + Send + Sync> SourceAdapter<Facts> for FixedAdapter<Facts> {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn enrich(&self, _identity: &LeadIdentity, _ctx: &RequestContext) -> Result<Option<Facts>, SourceError> {
            self.result.clone()
        }
    }

    fn immediate_pipeline<Facts: Clone + Send + Sync + 'static>(
        name: &'static str,
        result: Result<Option<Facts>, SourceError>,
    ) -> SourcePipeline<Facts> {
        SourcePipeline::new(
            Arc::new(FixedAdapter { name, result }),
            Arc::new(CircuitBreaker::new(name, CircuitBreakerConfig::default())),
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1), 1.0),
        )
    }

    /// A [`CrmWriter`] that always returns the same canned result.
    struct FixedCrmWriter(Result<(), crate::error::CrmError>);

    #[async_trait]
    impl CrmWriter for FixedCrmWriter {
        async fn update(
            &self,
            _crm_id: &str,
            _score: u8,
            _breakdown: &ScoreBreakdown,
            _projection: &CrmProjection,
        ) -> Result<(), crate::error::CrmError> {
            self.0.clone()
        }
    }

    /// Minimal in-memory [`AuditStore`], local to this test module so the
    /// orchestrator's own crate can exercise its audit-row progression
    /// without depending on a sibling storage crate.
    #[derive(Default)]
    struct TestAuditStore {
        rows: Mutex<HashMap<String, AuditRow>>,
    }

    fn missing(id: &str) -> crate::error::AuditStoreError {
        crate::error::AuditStoreError::Storage(format!("no row {id}"))
    }

    #[async_trait]
    impl AuditStore for TestAuditStore {
        async fn create(&self, new_row: NewAuditRow) -> Result<AuditRow, crate::error::AuditStoreError> {
            if new_row.lead_id.is_none() && new_row.crm_id.is_none() {
                return Err(crate::error::AuditStoreError::InvariantViolation(
                    "at least one of lead_id or crm_id must be set".into(),
                ));
            }
            let now = chrono::Utc::now();
            let row = AuditRow {
                id: new_row.job_id.clone(),
                lead_id: new_row.lead_id,
                crm_id: new_row.crm_id,
                job_id: new_row.job_id,
                status: EnrichmentStatus::Pending,
                places_facts: None,
                company_facts: None,
                webtech_facts: None,
                fit_score: None,
                score_breakdown: None,
                projection: None,
                crm_updated: false,
                crm_updated_at: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().unwrap().insert(row.id.clone(), row.clone());
            Ok(row)
        }

        async fn update_places(&self, id: &str, facts: &PlacesFacts) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.places_facts = Some(facts.clone());
            Ok(())
        }

        async fn update_company(&self, id: &str, facts: &CompanyFacts) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.company_facts = Some(facts.clone());
            Ok(())
        }

        async fn update_webtech(&self, id: &str, facts: &WebTechFacts) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.webtech_facts = Some(facts.clone());
            Ok(())
        }

        async fn update_score(
            &self,
            id: &str,
            score: u8,
            breakdown: &ScoreBreakdown,
        ) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.fit_score = Some(score);
            row.score_breakdown = Some(*breakdown);
            Ok(())
        }

        async fn update_projection(&self, id: &str, projection: &CrmProjection) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.projection = Some(projection.clone());
            Ok(())
        }

        async fn update_crm_result(&self, id: &str, updated: bool) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.crm_updated = updated;
            if updated {
                row.crm_updated_at = Some(chrono::Utc::now());
            }
            Ok(())
        }

        async fn finalize(
            &self,
            id: &str,
            status: EnrichmentStatus,
            error: Option<&str>,
        ) -> Result<(), crate::error::AuditStoreError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(id).ok_or_else(|| missing(id))?;
            row.status = status;
            row.error_message = error.map(ToOwned::to_owned);
            Ok(())
        }

        async fn get(&self, id: &str) -> Result<Option<AuditRow>, crate::error::AuditStoreError> {
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }
    }

    fn identity_with_crm(crm_id: Option<&str>) -> LeadIdentity {
        LeadIdentity {
            external_id: "lead-1".into(),
            crm_id: crm_id.map(ToOwned::to_owned),
            business_name: "ABC Roofing".into(),
            website: Some("https://abcroofing.com".into()),
            phone: Some("+15551234567".into()),
            email: None,
            city: Some("Austin".into()),
            state: Some("TX".into()),
            attribution: HashMap::new(),
        }
    }

    fn premium_facts() -> (PlacesFacts, CompanyFacts, WebTechFacts) {
        (
            PlacesFacts {
                review_count: Some(35),
                operational: Some(true),
                address: Some("123 Main St".into()),
                place_id: Some("x".into()),
                ..Default::default()
            },
            CompanyFacts {
                years_in_business: Some(10),
                employee_count: Some(20),
                ..Default::default()
            },
            WebTechFacts::default(),
        )
    }

    fn build_orchestrator(
        places: SourcePipeline<PlacesFacts>,
        company: SourcePipeline<CompanyFacts>,
        webtech: SourcePipeline<WebTechFacts>,
        crm_writer: Arc<dyn CrmWriter + Send + Sync>,
    ) -> (Orchestrator, Arc<TestAuditStore>) {
        let audit = Arc::new(TestAuditStore::default());
        let orchestrator = Orchestrator::new(places, company, webtech, crm_writer, audit.clone(), Duration::from_secs(60));
        (orchestrator, audit)
    }

    /// Scenario 1, §8: every source succeeds, no trackers, no CRM id.
    #[tokio::test]
    async fn premium_path_scenario_completes_with_expected_score() {
        let (places, company, webtech) = premium_facts();
        let (orchestrator, audit) = build_orchestrator(
            immediate_pipeline("places", Ok(Some(places))),
            immediate_pipeline("company", Ok(Some(company))),
            immediate_pipeline("webtech", Ok(Some(webtech))),
            Arc::new(FixedCrmWriter(Ok(()))),
        );

        let response = orchestrator.enrich(identity_with_crm(None)).await.unwrap();

        assert_eq!(response.enrichment_status, EnrichmentStatus::Completed);
        assert_eq!(response.fit_score, 80);
        assert_eq!(response.crm_update_status, CrmUpdateStatus::Skipped);
        assert!(response.audit_persisted);

        let row = audit.get(&response.audit_id).await.unwrap().unwrap();
        assert_eq!(row.status, EnrichmentStatus::Completed);
        assert_eq!(row.fit_score, Some(80));
        assert!(row.places_facts.is_some());
        assert!(row.company_facts.is_some());
        assert!(row.webtech_facts.is_some());
        assert!(!row.crm_updated);
    }

    /// Scenario 3, §8: all three adapters return no facts. The webtech
    /// pipeline is stubbed with `Ok(Some(WebTechFacts::default()))` rather
    /// than `Ok(None)` -- the shape the real `WebTechAdapter` actually
    /// produces for a website-less identity (§4.3) -- so this exercises the
    /// `is_empty` all-false-webtech-is-still-empty rule, not an
    /// unreachable-in-production stub state.
    #[tokio::test]
    async fn empty_enrichment_scenario_yields_no_data_status() {
        let (orchestrator, audit) = build_orchestrator(
            immediate_pipeline("places", Ok(None)),
            immediate_pipeline("company", Ok(None)),
            immediate_pipeline("webtech", Ok(Some(WebTechFacts::default()))),
            Arc::new(FixedCrmWriter(Ok(()))),
        );
        let mut identity = identity_with_crm(None);
        identity.website = None;
        identity.phone = None;

        let response = orchestrator.enrich(identity).await.unwrap();

        assert_eq!(response.enrichment_status, EnrichmentStatus::NoData);
        assert_eq!(response.fit_score, 0);
        assert_eq!(response.projection.number_of_employees, None);
        assert!(!response.projection.has_website);
        assert!(!response.projection.has_gmb);

        let row = audit.get(&response.audit_id).await.unwrap().unwrap();
        assert_eq!(row.status, EnrichmentStatus::NoData);
    }

    /// Scenario 4, §8: the Places adapter throws, the others succeed; the
    /// final status is still `completed` and the surviving facts show up in
    /// the response (per-source isolation, §4.4 step 3).
    #[tokio::test]
    async fn single_source_failure_does_not_poison_the_others() {
        let company = CompanyFacts {
            employee_count: Some(4),
            years_in_business: Some(3),
            ..Default::default()
        };
        let (orchestrator, audit) = build_orchestrator(
            immediate_pipeline("places", Err(SourceError::Transient("upstream 500".into()))),
            immediate_pipeline("company", Ok(Some(company))),
            immediate_pipeline("webtech", Ok(Some(WebTechFacts::default()))),
            Arc::new(FixedCrmWriter(Ok(()))),
        );
        let mut identity = identity_with_crm(None);
        identity.website = None;
        identity.phone = None;

        let response = orchestrator.enrich(identity).await.unwrap();

        assert_eq!(response.enrichment_status, EnrichmentStatus::Completed);
        assert_eq!(response.score_breakdown.solvency.total, 20);
        assert_eq!(response.projection.number_of_employees.as_deref(), Some("3 - 5"));
        assert_eq!(response.projection.number_of_years_in_business.as_deref(), Some("1 - 3 Years"));

        let row = audit.get(&response.audit_id).await.unwrap().unwrap();
        assert!(row.places_facts.is_none());
        assert!(row.company_facts.is_some());
    }

    /// Scenario 6, §8: every adapter succeeds and the identity carries a CRM
    /// id, but the CRM write itself fails. The request still succeeds with
    /// `completed` and the failure is reported only via `crm_update_status`.
    #[tokio::test]
    async fn crm_write_failure_is_non_fatal() {
        let (places, company, webtech) = premium_facts();
        let (orchestrator, audit) = build_orchestrator(
            immediate_pipeline("places", Ok(Some(places))),
            immediate_pipeline("company", Ok(Some(company))),
            immediate_pipeline("webtech", Ok(Some(webtech))),
            Arc::new(FixedCrmWriter(Err(crate::error::CrmError::Fatal("permission denied".into())))),
        );

        let response = orchestrator
            .enrich(identity_with_crm(Some("00Q123456789012")))
            .await
            .unwrap();

        assert_eq!(response.enrichment_status, EnrichmentStatus::Completed);
        assert_eq!(response.crm_update_status, CrmUpdateStatus::Failed);

        let row = audit.get(&response.audit_id).await.unwrap().unwrap();
        assert!(!row.crm_updated);
        assert_eq!(row.status, EnrichmentStatus::Completed);
    }

    /// §4.4's precedence rule: input identity wins over `PlacesFacts` unless
    /// `overwrite_address_hint` is set, in which case Places wins for
    /// website/phone/city/state — exercised end-to-end via the score, which
    /// reads `identity.website` through `effective_identity`.
    #[tokio::test]
    async fn places_overwrite_hint_overrides_identity_website_for_scoring() {
        let places = PlacesFacts {
            website: Some("https://from-places.example.com".into()),
            overwrite_address_hint: true,
            ..Default::default()
        };
        let (orchestrator, _audit) = build_orchestrator(
            immediate_pipeline("places", Ok(Some(places))),
            immediate_pipeline("company", Ok(None)),
            immediate_pipeline("webtech", Ok(None)),
            Arc::new(FixedCrmWriter(Ok(()))),
        );
        let mut identity = identity_with_crm(None);
        identity.website = None;

        let response = orchestrator.enrich(identity).await.unwrap();

        // website component scores 10 only because Places' website won the
        // precedence rule and was folded into the identity used for scoring.
        assert_eq!(response.score_breakdown.solvency.website, 10);
        assert!(response.projection.has_website);
    }

    /// CRM id format validation happens before any adapter is ever dispatched.
    #[tokio::test]
    async fn invalid_crm_id_is_rejected_before_dispatch() {
        let (orchestrator, _audit) = build_orchestrator(
            immediate_pipeline("places", Ok(None)),
            immediate_pipeline("company", Ok(None)),
            immediate_pipeline("webtech", Ok(None)),
            Arc::new(FixedCrmWriter(Ok(()))),
        );

        let result = orchestrator.enrich(identity_with_crm(Some("not-a-crm-id"))).await;
        assert!(matches!(result, Err(EnrichError::Validation(_))));
    }
}
