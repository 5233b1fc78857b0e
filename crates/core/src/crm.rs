use std::sync::OnceLock;

use regex::Regex;

/// Canonical CRM record id format (§9): `00Q` followed by 12 or 15 alphanumeric
/// characters (15 or 18 characters total). Enforced at the identity boundary
/// (`LeadIdentity::validate`) and again at the C7 writer boundary, and anywhere
/// an id is interpolated into a query.
fn crm_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^00Q([A-Za-z0-9]{12}|[A-Za-z0-9]{15})$").expect("static regex"))
}

#[must_use]
pub fn is_valid_crm_id(id: &str) -> bool {
    crm_id_pattern().is_match(id)
}

/// Fixed template used to derive `gmb_url` from a Places `place_id` (§4.6).
#[must_use]
pub fn gmb_url_for(place_id: &str) -> String {
    format!("https://www.google.com/maps/place/?q=place_id:{place_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_15_char_ids() {
        assert!(is_valid_crm_id("00Q1234567890AB"));
    }

    #[test]
    fn accepts_18_char_ids() {
        assert!(is_valid_crm_id("00Q1234567890ABCDE"));
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(!is_valid_crm_id("xxQ1234567890AB"));
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_valid_crm_id("00Q12345"));
    }

    #[test]
    fn gmb_url_template() {
        assert_eq!(
            gmb_url_for("abc123"),
            "https://www.google.com/maps/place/?q=place_id:abc123"
        );
    }
}
