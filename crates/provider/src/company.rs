use async_trait::async_trait;
use chrono::Datelike;
use leadfit_core::{CompanyFacts, LeadIdentity, RequestContext, SourceAdapter, SourceError};
use serde::Deserialize;
use tracing::debug;

use crate::http::{self, SOURCE_HARD_TIMEOUT};

/// Best-match response from the company-data source (§6, egress contract
/// #2). `null`/absent is represented as `None` by `serde`'s default.
#[derive(Debug, Deserialize, Default)]
struct CompanyLookupResponse {
    #[serde(default)]
    matched: bool,
    #[serde(default)]
    founded_year: Option<u16>,
    #[serde(default)]
    employee_count: Option<u32>,
    #[serde(default)]
    size_range: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    revenue_range: Option<String>,
    #[serde(default)]
    headquarters: Option<String>,
}

/// Adapter over the company-data enrichment source (§4.3 "Company-data adapter").
pub struct CompanyAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CompanyAdapter {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }

    async fn lookup(&self, identity: &LeadIdentity) -> Result<CompanyLookupResponse, SourceError> {
        let mut query = vec![
            ("name", identity.business_name.clone()),
            ("api_key", self.api_key.clone()),
        ];
        if let Some(website) = &identity.website {
            query.push(("website", website.clone()));
        }
        if let Some(city) = &identity.city {
            query.push(("locality", city.clone()));
        }

        let response = self
            .client
            .get(format!("{}/v1/company", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| http::map_reqwest_error(&e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(CompanyLookupResponse::default());
        }
        if !response.status().is_success() {
            return Err(http::map_status_error(response.status()));
        }

        response
            .json::<CompanyLookupResponse>()
            .await
            .map_err(|e| http::map_reqwest_error(&e))
    }
}

#[async_trait]
impl SourceAdapter<CompanyFacts> for CompanyAdapter {
    fn source_name(&self) -> &'static str {
        "company"
    }

    async fn enrich(
        &self,
        identity: &LeadIdentity,
        ctx: &RequestContext,
    ) -> Result<Option<CompanyFacts>, SourceError> {
        let response = http::with_hard_timeout(SOURCE_HARD_TIMEOUT, ctx, self.lookup(identity)).await?;

        if !response.matched {
            debug!(source = "company", "no match returned");
            return Ok(None);
        }

        let mut facts = CompanyFacts {
            founded_year: response.founded_year,
            years_in_business: None,
            employee_count: response.employee_count,
            size_range: response.size_range,
            industry: response.industry,
            revenue_range: response.revenue_range,
            headquarters: response.headquarters,
        };
        let current_year = u16::try_from(chrono::Utc::now().year()).unwrap_or(9999);
        facts.derive_years_in_business(current_year);

        Ok(Some(facts))
    }
}
