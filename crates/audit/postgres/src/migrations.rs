use sqlx::PgPool;

/// Create the `leads` and `lead_enrichments` tables and their indexes if
/// they do not already exist (§6 "Persisted state"). Column additions use
/// `ADD COLUMN IF NOT EXISTS` so re-running this against an existing
/// deployment is always safe.
pub async fn run_migrations(pool: &PgPool, prefix: &str) -> Result<(), sqlx::Error> {
    let leads_table = format!("{prefix}leads");
    let enrichments_table = format!("{prefix}lead_enrichments");

    let create_leads = format!(
        "
        CREATE TABLE IF NOT EXISTS {leads_table} (
            id              TEXT PRIMARY KEY,
            external_id     TEXT NOT NULL,
            salesforce_lead_id TEXT,
            business_name   TEXT NOT NULL,
            raw_identity    JSONB NOT NULL,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "
    );
    sqlx::query(&create_leads).execute(pool).await?;

    let create_enrichments = format!(
        "
        CREATE TABLE IF NOT EXISTS {enrichments_table} (
            id                TEXT PRIMARY KEY,
            lead_id           TEXT REFERENCES {leads_table}(id),
            salesforce_lead_id TEXT,
            job_id            TEXT NOT NULL,
            status            TEXT NOT NULL,
            places_facts      JSONB,
            company_facts     JSONB,
            webtech_facts     JSONB,
            fit_score         SMALLINT,
            score_breakdown   JSONB,
            projection        JSONB,
            crm_updated       BOOLEAN NOT NULL DEFAULT false,
            crm_updated_at    TIMESTAMPTZ,
            error_message     TEXT,
            created_at        TIMESTAMPTZ NOT NULL,
            updated_at        TIMESTAMPTZ NOT NULL,
            CONSTRAINT {prefix}lead_or_crm_id_present
                CHECK (lead_id IS NOT NULL OR salesforce_lead_id IS NOT NULL),
            CONSTRAINT {prefix}status_enum
                CHECK (status IN ('pending', 'success', 'partial', 'failed', 'completed', 'no_data'))
        )
        "
    );
    sqlx::query(&create_enrichments).execute(pool).await?;

    let indexes = [
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}enrichments_lead_id ON {enrichments_table} (lead_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}enrichments_crm_id ON {enrichments_table} (salesforce_lead_id)"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{prefix}enrichments_status ON {enrichments_table} (status, updated_at DESC)"
        ),
    ];
    for idx in &indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}
