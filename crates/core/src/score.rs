use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::facts::EnrichmentRecord;
use crate::identity::LeadIdentity;

/// The five solvency components and their sum (§3, §4.5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SolvencyBreakdown {
    pub website: u8,
    pub reviews: u8,
    pub years_in_business: u8,
    pub employees: u8,
    pub location: u8,
    pub total: u8,
}

/// The tracker-presence bonus and the pixel count it was derived from (§3, §4.5).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PixelBonus {
    pub pixel_count: u8,
    pub bonus: u8,
}

/// Structured decomposition of the fit score (§3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ScoreBreakdown {
    pub solvency: SolvencyBreakdown,
    pub pixel_bonus: PixelBonus,
    pub final_score: u8,
}

fn website_component(identity: &LeadIdentity, record: &EnrichmentRecord) -> u8 {
    let places_has_website = record
        .places
        .as_ref()
        .and_then(|p| p.website.as_deref())
        .is_some_and(|w| !w.trim().is_empty());
    if identity.has_website() || places_has_website { 10 } else { 0 }
}

fn reviews_component(record: &EnrichmentRecord) -> u8 {
    match record.places.as_ref().and_then(|p| p.review_count) {
        Some(n) if n >= 30 => 25,
        Some(n) if n >= 15 => 20,
        Some(n) if n >= 5 => 10,
        _ => 0,
    }
}

fn years_in_business_component(record: &EnrichmentRecord) -> u8 {
    match record.company.as_ref().and_then(|c| c.years_in_business) {
        Some(n) if n >= 8 => 20,
        Some(n) if n >= 4 => 15,
        Some(n) if n >= 2 => 10,
        _ => 0,
    }
}

fn employees_component(record: &EnrichmentRecord) -> u8 {
    match record.company.as_ref().and_then(crate::facts::CompanyFacts::best_employee_count) {
        Some(n) if n >= 16 => 20,
        Some(n) if n >= 6 => 15,
        Some(n) if n >= 3 => 10,
        _ => 0,
    }
}

fn location_component(record: &EnrichmentRecord) -> u8 {
    let Some(places) = record.places.as_ref() else {
        return 0;
    };
    let operational = places.operational.unwrap_or(false);
    let has_address = places.address.as_deref().is_some_and(|a| !a.trim().is_empty());
    if operational && has_address { 5 } else { 0 }
}

fn pixel_bonus(record: &EnrichmentRecord) -> PixelBonus {
    let pixel_count = record.webtech.as_ref().map_or(0, crate::facts::WebTechFacts::pixel_count);
    let bonus = match pixel_count {
        0 => 0,
        1 => 5,
        _ => 10,
    };
    PixelBonus { pixel_count, bonus }
}

/// Pure, deterministic, total function: `EnrichmentRecord -> ScoreBreakdown` (§4.5, C5).
///
/// Absent sub-records contribute zero. Never reads the clock, randomness, or
/// shared state, and is defined for every possible `EnrichmentRecord`
/// including the empty one (which scores 0).
#[must_use]
pub fn score(identity: &LeadIdentity, record: &EnrichmentRecord) -> ScoreBreakdown {
    let solvency = SolvencyBreakdown {
        website: website_component(identity, record),
        reviews: reviews_component(record),
        years_in_business: years_in_business_component(record),
        employees: employees_component(record),
        location: location_component(record),
        total: 0,
    };
    let total = solvency.website
        + solvency.reviews
        + solvency.years_in_business
        + solvency.employees
        + solvency.location;
    let solvency = SolvencyBreakdown { total, ..solvency };

    let pixel_bonus = pixel_bonus(record);

    let final_score = u16::from(solvency.total) + u16::from(pixel_bonus.bonus);
    let final_score = u8::try_from(final_score.min(100)).expect("clamped to <= 100");

    ScoreBreakdown {
        solvency,
        pixel_bonus,
        final_score,
    }
}
