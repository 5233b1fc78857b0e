use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::crm::gmb_url_for;
use crate::facts::EnrichmentRecord;
use crate::identity::LeadIdentity;

/// The fixed-shape, nine-field projection of enrichment facts into the CRM's
/// picklist/boolean schema (§3, §4.6, C6). Every field takes one of its
/// documented values or `null` — the function producing it is total.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CrmProjection {
    pub has_website: bool,
    pub number_of_employees: Option<String>,
    pub number_of_gbp_reviews: Option<String>,
    pub number_of_years_in_business: Option<String>,
    pub has_gmb: bool,
    pub gmb_url: Option<String>,
    pub location_type: Option<String>,
    /// Never derivable from any source; always `null` (§3, §8).
    pub business_license: Option<String>,
    pub spending_on_marketing: bool,
}

const STOREFRONT_TAGS: &[&str] = &["storefront", "retail", "store", "store_front"];
const HOME_OFFICE_TAGS: &[&str] = &["service_area_business", "home_office", "residential"];

fn number_of_employees(record: &EnrichmentRecord) -> Option<String> {
    let n = record.company.as_ref().and_then(crate::facts::CompanyFacts::best_employee_count)?;
    Some(match n {
        0 => "0",
        1..=2 => "1 - 2",
        3..=5 => "3 - 5",
        _ => "Over 5",
    }.to_owned())
}

fn number_of_gbp_reviews(record: &EnrichmentRecord) -> Option<String> {
    let n = record.places.as_ref()?.review_count?;
    Some(if n < 15 { "Under 15" } else { "Over 14" }.to_owned())
}

fn number_of_years_in_business(record: &EnrichmentRecord) -> Option<String> {
    let n = record.company.as_ref()?.years_in_business?;
    Some(
        if n < 1 {
            "Under 1 Year"
        } else if n <= 3 {
            "1 - 3 Years"
        } else if n <= 5 {
            "3 - 5 Years"
        } else {
            "5 - 10+ years"
        }
        .to_owned(),
    )
}

fn location_type(record: &EnrichmentRecord) -> Option<String> {
    let places = record.places.as_ref()?;
    let tags: Vec<String> = places.types.iter().map(|t| t.to_lowercase()).collect();
    if tags.iter().any(|t| STOREFRONT_TAGS.contains(&t.as_str())) {
        return Some("Retail Location (Store Front)".to_owned());
    }
    if tags.iter().any(|t| HOME_OFFICE_TAGS.contains(&t.as_str())) {
        return Some("Home Office".to_owned());
    }
    Some("Physical Location (Office)".to_owned())
}

/// Whether the website's domain is old enough for `spending_on_marketing`.
///
/// No source in this pipeline performs a WHOIS lookup, so domain age is
/// approximated by `company.years_in_business` — the only "how long has this
/// business existed" signal available (see DESIGN.md). When that is unknown,
/// domain age is treated as unknown and the rule evaluates to `false`.
fn domain_age_at_least_two_years(record: &EnrichmentRecord) -> bool {
    record
        .company
        .as_ref()
        .and_then(|c| c.years_in_business)
        .is_some_and(|years| years >= 2)
}

/// Pure, total function: `(LeadIdentity, EnrichmentRecord) -> CrmProjection` (§4.6, C6).
#[must_use]
pub fn project(identity: &LeadIdentity, record: &EnrichmentRecord) -> CrmProjection {
    let places_website = record
        .places
        .as_ref()
        .and_then(|p| p.website.as_deref())
        .is_some_and(|w| !w.trim().is_empty());
    let has_website = identity.has_website() || places_website;

    let place_id = record.places.as_ref().and_then(|p| p.place_id.clone());
    let has_gmb = place_id.as_deref().is_some_and(|id| !id.is_empty());
    let gmb_url = place_id.filter(|id| !id.is_empty()).map(|id| gmb_url_for(&id));

    let spending_on_marketing = domain_age_at_least_two_years(record)
        && record.webtech.as_ref().is_some_and(crate::facts::WebTechFacts::has_any_ad_tracker);

    CrmProjection {
        has_website,
        number_of_employees: number_of_employees(record),
        number_of_gbp_reviews: number_of_gbp_reviews(record),
        number_of_years_in_business: number_of_years_in_business(record),
        has_gmb,
        gmb_url,
        location_type: location_type(record),
        business_license: None,
        spending_on_marketing,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::facts::{CompanyFacts, PlacesFacts, WebTechFacts};

    fn identity() -> LeadIdentity {
        LeadIdentity {
            external_id: "lead-1".into(),
            crm_id: None,
            business_name: "ABC Roofing".into(),
            website: Some("https://abcroofing.com".into()),
            phone: None,
            email: None,
            city: None,
            state: None,
            attribution: HashMap::new(),
        }
    }

    #[test]
    fn business_license_is_always_null() {
        let projection = project(&identity(), &EnrichmentRecord::default());
        assert_eq!(projection.business_license, None);
    }

    #[test]
    fn empty_record_has_no_picklist_values() {
        let mut id = identity();
        id.website = None;
        let projection = project(&id, &EnrichmentRecord::default());
        assert!(!projection.has_website);
        assert!(!projection.has_gmb);
        assert_eq!(projection.number_of_employees, None);
        assert_eq!(projection.number_of_gbp_reviews, None);
        assert_eq!(projection.number_of_years_in_business, None);
        assert_eq!(projection.location_type, None);
        assert!(!projection.spending_on_marketing);
    }

    #[test]
    fn premium_path_scenario() {
        let record = EnrichmentRecord {
            places: Some(PlacesFacts {
                review_count: Some(35),
                place_id: Some("x".into()),
                ..Default::default()
            }),
            company: Some(CompanyFacts {
                years_in_business: Some(10),
                employee_count: Some(20),
                ..Default::default()
            }),
            webtech: Some(WebTechFacts::default()),
        };
        let projection = project(&identity(), &record);
        assert_eq!(projection.number_of_employees.as_deref(), Some("Over 5"));
        assert_eq!(projection.number_of_gbp_reviews.as_deref(), Some("Over 14"));
        assert_eq!(projection.number_of_years_in_business.as_deref(), Some("5 - 10+ years"));
        assert!(projection.has_gmb);
        assert!(!projection.spending_on_marketing);
    }

    #[test]
    fn tracker_bonus_scenario_flags_marketing_spend() {
        let record = EnrichmentRecord {
            places: Some(PlacesFacts { place_id: Some("x".into()), ..Default::default() }),
            company: Some(CompanyFacts { years_in_business: Some(10), ..Default::default() }),
            webtech: Some(WebTechFacts { has_conversion_pixel: true, has_analytics_tag: true, ..Default::default() }),
        };
        let projection = project(&identity(), &record);
        assert!(projection.spending_on_marketing);
    }

    #[test]
    fn single_source_failure_isolation_scenario() {
        let record = EnrichmentRecord {
            places: None,
            company: Some(CompanyFacts { employee_count: Some(4), years_in_business: Some(3), ..Default::default() }),
            webtech: Some(WebTechFacts::default()),
        };
        let mut id = identity();
        id.website = None;
        let projection = project(&id, &record);
        assert_eq!(projection.number_of_employees.as_deref(), Some("3 - 5"));
        assert_eq!(projection.number_of_years_in_business.as_deref(), Some("1 - 3 Years"));
    }

    #[test]
    fn years_tie_boundaries_resolve_to_lower_bucket() {
        let record_at_3 = EnrichmentRecord {
            company: Some(CompanyFacts { years_in_business: Some(3), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(number_of_years_in_business(&record_at_3).as_deref(), Some("1 - 3 Years"));

        let record_at_5 = EnrichmentRecord {
            company: Some(CompanyFacts { years_in_business: Some(5), ..Default::default() }),
            ..Default::default()
        };
        assert_eq!(number_of_years_in_business(&record_at_5).as_deref(), Some("3 - 5 Years"));
    }
}
