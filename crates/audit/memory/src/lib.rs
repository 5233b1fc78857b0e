//! In-memory [`AuditStore`] backend, suitable for local development and
//! integration tests. Rows live only for the lifetime of the process.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use leadfit_audit::{AuditRow, AuditStore, AuditStoreError, NewAuditRow};
use leadfit_core::{CompanyFacts, CrmProjection, EnrichmentStatus, PlacesFacts, ScoreBreakdown, WebTechFacts};

/// `DashMap`-backed [`AuditStore`]. Cheap to clone; every clone shares the
/// same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditStore {
    rows: std::sync::Arc<DashMap<String, AuditRow>>,
}

impl InMemoryAuditStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get_mut_or_missing(&self, id: &str) -> Result<dashmap::mapref::one::RefMut<'_, String, AuditRow>, AuditStoreError> {
        self.rows
            .get_mut(id)
            .ok_or_else(|| AuditStoreError::Storage(format!("no audit row with id {id}")))
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn create(&self, new_row: NewAuditRow) -> Result<AuditRow, AuditStoreError> {
        if new_row.lead_id.is_none() && new_row.crm_id.is_none() {
            return Err(AuditStoreError::InvariantViolation(
                "at least one of lead_id or crm_id must be set".into(),
            ));
        }

        let now = Utc::now();
        let row = AuditRow {
            id: uuid::Uuid::new_v4().to_string(),
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
        self.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update_places(&self, id: &str, facts: &PlacesFacts) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.places_facts = Some(facts.clone());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_company(&self, id: &str, facts: &CompanyFacts) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.company_facts = Some(facts.clone());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_webtech(&self, id: &str, facts: &WebTechFacts) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.webtech_facts = Some(facts.clone());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_score(
        &self,
        id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
    ) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.fit_score = Some(score);
        row.score_breakdown = Some(*breakdown);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_projection(&self, id: &str, projection: &CrmProjection) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.projection = Some(projection.clone());
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn update_crm_result(&self, id: &str, updated: bool) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.crm_updated = updated;
        if updated {
            row.crm_updated_at = Some(Utc::now());
        }
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize(
        &self,
        id: &str,
        status: EnrichmentStatus,
        error: Option<&str>,
    ) -> Result<(), AuditStoreError> {
        let mut row = self.get_mut_or_missing(id)?;
        row.status = status;
        row.error_message = error.map(str::to_owned);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AuditRow>, AuditStoreError> {
        Ok(self.rows.get(id).map(|r| r.clone()))
    }
}
