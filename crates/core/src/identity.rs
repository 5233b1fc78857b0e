use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// The opaque prefix used by every Salesforce-style CRM record id.
pub const CRM_ID_PREFIX: &str = "00Q";

/// The sparse business identity that enters the enrichment pipeline.
///
/// Only `business_name` is guaranteed to be present after [`LeadIdentity::validate`];
/// every other field describes partial, possibly-stale information supplied by
/// the webhook caller and is refined (or overridden, per §4.4's precedence rule)
/// by the source adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LeadIdentity {
    /// Caller-supplied identifier for this lead (CRM-external, e.g. the local `leads.id`).
    pub external_id: String,
    /// Opaque CRM record id (15 or 18 alphanumeric characters, `00Q`-prefixed), if known.
    #[serde(default)]
    pub crm_id: Option<String>,
    /// Business name. Non-empty after validation.
    pub business_name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// UTM and click-id attribution tokens (`utm_source`, `gclid`, ...), passed through untouched.
    #[serde(default)]
    pub attribution: HashMap<String, String>,
}

/// Error raised when a [`LeadIdentity`] fails validation at the request boundary.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityValidationError {
    #[error("business_name is required and must be non-empty after trimming")]
    MissingBusinessName,
    #[error("external_id is required and must be non-empty")]
    MissingExternalId,
    #[error("crm_id does not match the expected 00Q-prefixed 15/18 character format")]
    InvalidCrmId,
}

impl LeadIdentity {
    /// Validate the invariant required by §3: at least `business_name` must be present,
    /// and `external_id` must be set (it is how the audit row links back to `leads`).
    /// Trims whitespace from `business_name` in place.
    pub fn validate(&mut self) -> Result<(), IdentityValidationError> {
        self.business_name = self.business_name.trim().to_owned();
        if self.business_name.is_empty() {
            return Err(IdentityValidationError::MissingBusinessName);
        }
        if self.external_id.trim().is_empty() {
            return Err(IdentityValidationError::MissingExternalId);
        }
        if let Some(crm_id) = &self.crm_id
            && !crate::crm::is_valid_crm_id(crm_id)
        {
            return Err(IdentityValidationError::InvalidCrmId);
        }
        Ok(())
    }

    #[must_use]
    pub fn has_website(&self) -> bool {
        self.website.as_deref().is_some_and(|w| !w.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LeadIdentity {
        LeadIdentity {
            external_id: "lead-1".into(),
            crm_id: None,
            business_name: "  ABC Roofing  ".into(),
            website: None,
            phone: None,
            email: None,
            city: None,
            state: None,
            attribution: HashMap::new(),
        }
    }

    #[test]
    fn validate_trims_business_name() {
        let mut id = base();
        id.validate().unwrap();
        assert_eq!(id.business_name, "ABC Roofing");
    }

    #[test]
    fn validate_rejects_blank_business_name() {
        let mut id = base();
        id.business_name = "   ".into();
        assert_eq!(
            id.validate().unwrap_err(),
            IdentityValidationError::MissingBusinessName
        );
    }

    #[test]
    fn validate_rejects_malformed_crm_id() {
        let mut id = base();
        id.crm_id = Some("not-a-crm-id".into());
        assert_eq!(id.validate().unwrap_err(), IdentityValidationError::InvalidCrmId);
    }

    #[test]
    fn validate_accepts_15_and_18_char_crm_ids() {
        let mut id = base();
        id.crm_id = Some("00Q123456789012".into());
        id.validate().unwrap();

        let mut id2 = base();
        id2.crm_id = Some("00Q123456789012345".into());
        id2.validate().unwrap();
    }

    #[test]
    fn has_website_ignores_blank_string() {
        let mut id = base();
        id.website = Some("   ".into());
        assert!(!id.has_website());
        id.website = Some("https://abcroofing.com".into());
        assert!(id.has_website());
    }
}
