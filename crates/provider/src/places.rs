use async_trait::async_trait;
use leadfit_core::{LeadIdentity, PlacesFacts, RequestContext, SourceAdapter, SourceError};
use serde::Deserialize;
use tracing::debug;

use crate::http::{self, SOURCE_HARD_TIMEOUT};

/// A single candidate returned by the Places source's text+location search
/// (§6, egress contract #1). Unknown/extra fields are ignored by `serde`
/// (§9 "dynamic-typed upstream payloads map to strongly-typed Facts value
/// types").
#[derive(Debug, Deserialize)]
struct PlacesCandidate {
    place_id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    primary_category: Option<String>,
    #[serde(default)]
    review_count: Option<u32>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    operational: Option<bool>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    /// Confidence signal (0.0-1.0) the source assigns this candidate against
    /// the query, used to pick the best match (§4.3).
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct PlacesSearchResponse {
    #[serde(default)]
    candidates: Vec<PlacesCandidate>,
}

/// Adapter over the Places business-directory source (§4.3 "Places adapter").
pub struct PlacesAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PlacesAdapter {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }

    async fn search(&self, identity: &LeadIdentity) -> Result<PlacesSearchResponse, SourceError> {
        let mut query = vec![
            ("name", identity.business_name.clone()),
            ("api_key", self.api_key.clone()),
        ];
        if let Some(city) = &identity.city {
            query.push(("city", city.clone()));
        }
        if let Some(state) = &identity.state {
            query.push(("state", state.clone()));
        }
        if let Some(phone) = &identity.phone {
            query.push(("phone", phone.clone()));
        }

        let response = self
            .client
            .get(format!("{}/v1/search", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| http::map_reqwest_error(&e))?;

        if !response.status().is_success() {
            return Err(http::map_status_error(response.status()));
        }

        response
            .json::<PlacesSearchResponse>()
            .await
            .map_err(|e| http::map_reqwest_error(&e))
    }
}

fn normalize(value: &str) -> String {
    value.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

fn high_confidence_match(identity: &LeadIdentity, candidate: &PlacesCandidate) -> bool {
    let phone_matches = identity
        .phone
        .as_deref()
        .zip(candidate.phone.as_deref())
        .is_some_and(|(a, b)| normalize(a) == normalize(b));
    let name_matches = candidate
        .name
        .as_deref()
        .is_some_and(|name| normalize(name) == normalize(&identity.business_name));
    phone_matches && name_matches
}

#[async_trait]
impl SourceAdapter<PlacesFacts> for PlacesAdapter {
    fn source_name(&self) -> &'static str {
        "places"
    }

    async fn enrich(
        &self,
        identity: &LeadIdentity,
        ctx: &RequestContext,
    ) -> Result<Option<PlacesFacts>, SourceError> {
        let response = http::with_hard_timeout(SOURCE_HARD_TIMEOUT, ctx, self.search(identity)).await?;

        let Some(best) = response
            .candidates
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        else {
            debug!(source = "places", "no candidates returned");
            return Ok(None);
        };

        let overwrite_address_hint = high_confidence_match(identity, &best);

        Ok(Some(PlacesFacts {
            place_id: best.place_id,
            name: best.name,
            primary_category: best.primary_category,
            review_count: best.review_count,
            rating: best.rating,
            address: best.address,
            operational: best.operational,
            website: best.website,
            phone: best.phone,
            locality: best.locality,
            types: best.types,
            overwrite_address_hint,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_ignores_punctuation_and_case() {
        assert_eq!(normalize("+1 (555) 123-4567"), normalize("15551234567"));
        assert_eq!(normalize("ABC Roofing"), normalize("abc roofing"));
    }

    #[test]
    fn high_confidence_requires_both_phone_and_name() {
        let identity = LeadIdentity {
            external_id: "1".into(),
            crm_id: None,
            business_name: "ABC Roofing".into(),
            website: None,
            phone: Some("+15551234567".into()),
            email: None,
            city: None,
            state: None,
            attribution: Default::default(),
        };
        let matching = PlacesCandidate {
            place_id: None,
            name: Some("ABC Roofing".into()),
            primary_category: None,
            review_count: None,
            rating: None,
            address: None,
            operational: None,
            website: None,
            phone: Some("15551234567".into()),
            locality: None,
            types: vec![],
            confidence: 0.9,
        };
        assert!(high_confidence_match(&identity, &matching));

        let mismatched_phone = PlacesCandidate { phone: Some("15559999999".into()), ..matching };
        assert!(!high_confidence_match(&identity, &mismatched_phone));
    }
}
