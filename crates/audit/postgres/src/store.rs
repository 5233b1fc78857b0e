use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadfit_audit::{AuditRow, AuditStore, AuditStoreError, NewAuditRow};
use leadfit_core::{CompanyFacts, CrmProjection, EnrichmentStatus, PlacesFacts, ScoreBreakdown, WebTechFacts};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, types::Json};

use crate::config::PostgresAuditConfig;
use crate::migrations;

/// Postgres-backed [`AuditStore`] over the `lead_enrichments` table (§6).
pub struct PostgresAuditStore {
    pool: PgPool,
    table: String,
}

impl PostgresAuditStore {
    /// Connect, run migrations, and return a ready store.
    pub async fn new(config: &PostgresAuditConfig) -> Result<Self, AuditStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;

        migrations::run_migrations(&pool, &config.prefix)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;

        Ok(Self { pool, table: format!("{}lead_enrichments", config.prefix) })
    }

    /// Build from an already-connected pool (useful for tests against a
    /// shared test database).
    pub async fn from_pool(pool: PgPool, prefix: &str) -> Result<Self, AuditStoreError> {
        migrations::run_migrations(&pool, prefix)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        Ok(Self { pool, table: format!("{prefix}lead_enrichments") })
    }
}

#[derive(sqlx::FromRow)]
struct Row {
    id: String,
    lead_id: Option<String>,
    salesforce_lead_id: Option<String>,
    job_id: String,
    status: String,
    places_facts: Option<Json<PlacesFacts>>,
    company_facts: Option<Json<CompanyFacts>>,
    webtech_facts: Option<Json<WebTechFacts>>,
    fit_score: Option<i16>,
    score_breakdown: Option<Json<ScoreBreakdown>>,
    projection: Option<Json<CrmProjection>>,
    crm_updated: bool,
    crm_updated_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_status(raw: &str) -> EnrichmentStatus {
    match raw {
        "success" => EnrichmentStatus::Success,
        "partial" => EnrichmentStatus::Partial,
        "failed" => EnrichmentStatus::Failed,
        "completed" => EnrichmentStatus::Completed,
        "no_data" => EnrichmentStatus::NoData,
        _ => EnrichmentStatus::Pending,
    }
}

impl From<Row> for AuditRow {
    fn from(row: Row) -> Self {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let fit_score = row.fit_score.map(|n| n.clamp(0, i16::from(u8::MAX)) as u8);

        Self {
            id: row.id,
            lead_id: row.lead_id,
            crm_id: row.salesforce_lead_id,
            job_id: row.job_id,
            status: parse_status(&row.status),
            places_facts: row.places_facts.map(|j| j.0),
            company_facts: row.company_facts.map(|j| j.0),
            webtech_facts: row.webtech_facts.map(|j| j.0),
            fit_score,
            score_breakdown: row.score_breakdown.map(|j| j.0),
            projection: row.projection.map(|j| j.0),
            crm_updated: row.crm_updated,
            crm_updated_at: row.crm_updated_at,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn create(&self, new_row: NewAuditRow) -> Result<AuditRow, AuditStoreError> {
        if new_row.lead_id.is_none() && new_row.crm_id.is_none() {
            return Err(AuditStoreError::InvariantViolation(
                "at least one of lead_id or crm_id must be set".into(),
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO {} (id, lead_id, salesforce_lead_id, job_id, status, crm_updated, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'pending', false, $5, $5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&new_row.lead_id)
            .bind(&new_row.crm_id)
            .bind(&new_row.job_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;

        Ok(AuditRow {
            id,
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
        })
    }

    async fn update_places(&self, id: &str, facts: &PlacesFacts) -> Result<(), AuditStoreError> {
        let sql = format!("UPDATE {} SET places_facts = $1, updated_at = $2 WHERE id = $3", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(facts))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn update_company(&self, id: &str, facts: &CompanyFacts) -> Result<(), AuditStoreError> {
        let sql = format!("UPDATE {} SET company_facts = $1, updated_at = $2 WHERE id = $3", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(facts))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn update_webtech(&self, id: &str, facts: &WebTechFacts) -> Result<(), AuditStoreError> {
        let sql = format!("UPDATE {} SET webtech_facts = $1, updated_at = $2 WHERE id = $3", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(facts))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn update_score(
        &self,
        id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
    ) -> Result<(), AuditStoreError> {
        let sql = format!(
            "UPDATE {} SET fit_score = $1, score_breakdown = $2, updated_at = $3 WHERE id = $4",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(i16::from(score))
            .bind(Json(breakdown))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn update_projection(&self, id: &str, projection: &CrmProjection) -> Result<(), AuditStoreError> {
        let sql = format!("UPDATE {} SET projection = $1, updated_at = $2 WHERE id = $3", self.table);
        let result = sqlx::query(&sql)
            .bind(Json(projection))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn update_crm_result(&self, id: &str, updated: bool) -> Result<(), AuditStoreError> {
        let sql = format!(
            "UPDATE {} SET crm_updated = $1, crm_updated_at = CASE WHEN $1 THEN $2 ELSE crm_updated_at END, updated_at = $2 WHERE id = $3",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(updated)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn finalize(
        &self,
        id: &str,
        status: EnrichmentStatus,
        error: Option<&str>,
    ) -> Result<(), AuditStoreError> {
        let sql = format!(
            "UPDATE {} SET status = $1, error_message = $2, updated_at = $3 WHERE id = $4",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(status.to_string())
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        ensure_one_row(result.rows_affected(), id)
    }

    async fn get(&self, id: &str) -> Result<Option<AuditRow>, AuditStoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", self.table);
        let row = sqlx::query_as::<_, Row>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuditStoreError::Storage(e.to_string()))?;
        Ok(row.map(Into::into))
    }
}

fn ensure_one_row(rows_affected: u64, id: &str) -> Result<(), AuditStoreError> {
    if rows_affected == 0 {
        return Err(AuditStoreError::Storage(format!("no audit row with id {id}")));
    }
    Ok(())
}
