use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Facts returned by the Places source adapter (C3).
///
/// `overwrite_address_hint` is set by the adapter only when both the
/// normalized phone number and the normalized business name were
/// high-confidence matches against the input identity (§3, §4.3) -- it
/// signals to the orchestrator that these facts should win the precedence
/// rule for overlapping fields (website, phone, city, state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct PlacesFacts {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub primary_category: Option<String>,
    #[serde(default)]
    pub review_count: Option<u32>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub operational: Option<bool>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub overwrite_address_hint: bool,
}

/// Facts returned by the company-data source adapter (C3).
///
/// Either `employee_count` or `size_range` may be present; neither is
/// required. `years_in_business` is always derived by the adapter from
/// `founded_year` when present, never supplied directly by the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CompanyFacts {
    #[serde(default)]
    pub founded_year: Option<u16>,
    #[serde(default)]
    pub years_in_business: Option<u32>,
    #[serde(default)]
    pub employee_count: Option<u32>,
    #[serde(default)]
    pub size_range: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue_range: Option<String>,
    #[serde(default)]
    pub headquarters: Option<String>,
}

impl CompanyFacts {
    /// `years_in_business = max(0, current_year - founded_year)` (§4.3).
    pub fn derive_years_in_business(&mut self, current_year: u16) {
        self.years_in_business = self
            .founded_year
            .map(|founded| u32::from(current_year.saturating_sub(founded)));
    }

    /// The best-available employee count: the exact `employee_count` if present,
    /// else the midpoint of a parseable `size_range` (e.g. `"11-50"` -> 30,
    /// `"200+"` -> 200), else `None`. Used by both the fit-score calculator
    /// (§4.5) and the CRM projector (§4.6).
    #[must_use]
    pub fn best_employee_count(&self) -> Option<u32> {
        if let Some(n) = self.employee_count {
            return Some(n);
        }
        self.size_range.as_deref().and_then(parse_size_range_midpoint)
    }
}

fn parse_size_range_midpoint(range: &str) -> Option<u32> {
    let trimmed = range.trim().trim_end_matches('+');
    if let Some((lo, hi)) = trimmed.split_once('-') {
        let lo: u32 = lo.trim().parse().ok()?;
        let hi: u32 = hi.trim().parse().ok()?;
        return Some((lo + hi) / 2);
    }
    trimmed.parse().ok()
}

/// Facts returned by the web-tech detection adapter (C3). Always present,
/// defaulting to all-false when the website is absent or detection fails
/// (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WebTechFacts {
    /// Conversion pixel (e.g. Meta Pixel).
    #[serde(default)]
    pub has_conversion_pixel: bool,
    /// Web-analytics tag (e.g. GA4).
    #[serde(default)]
    pub has_analytics_tag: bool,
    /// Ads-conversion tag (e.g. Google Ads).
    #[serde(default)]
    pub has_ads_conversion_tag: bool,
    /// Second-network pixel (e.g. TikTok Pixel).
    #[serde(default)]
    pub has_second_network_pixel: bool,
    /// Marketing-automation script (e.g. HubSpot, Marketo).
    #[serde(default)]
    pub has_marketing_automation: bool,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl WebTechFacts {
    /// Number of the first four trackers (the "pixel" trackers, excluding
    /// the marketing-automation script) that are present (§3).
    #[must_use]
    pub fn pixel_count(&self) -> u8 {
        u8::from(self.has_conversion_pixel)
            + u8::from(self.has_analytics_tag)
            + u8::from(self.has_ads_conversion_tag)
            + u8::from(self.has_second_network_pixel)
    }

    /// Whether any advertising-style tracker (as opposed to analytics or
    /// marketing automation) was detected — used by the `spending_on_marketing`
    /// CRM projection rule (§4.6).
    #[must_use]
    pub fn has_any_ad_tracker(&self) -> bool {
        self.has_conversion_pixel || self.has_ads_conversion_tag || self.has_second_network_pixel
    }
}

/// Aggregate of the three independently-optional Facts structures produced
/// by one enrichment attempt (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EnrichmentRecord {
    #[serde(default)]
    pub places: Option<PlacesFacts>,
    #[serde(default)]
    pub company: Option<CompanyFacts>,
    #[serde(default)]
    pub webtech: Option<WebTechFacts>,
}

impl EnrichmentRecord {
    /// True if no source produced any facts at all (scenario 3, §8).
    ///
    /// The web-tech adapter always returns `Some(WebTechFacts::default())`
    /// rather than `None` when the identity has no website or detection
    /// fails (§3, §4.3) -- so an all-false, tool-less `WebTechFacts` carries
    /// no information and is treated the same as an absent one here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.places.is_none()
            && self.company.is_none()
            && self.webtech.as_ref().is_none_or(|w| *w == WebTechFacts::default())
    }
}
