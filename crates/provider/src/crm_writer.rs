use std::sync::Arc;

use async_trait::async_trait;
use leadfit_core::{CrmError, CrmProjection, CrmWriter, ScoreBreakdown, is_valid_crm_id};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::http;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    instance_url: String,
}

/// A cached session token plus the instance URL it is valid against.
#[derive(Clone)]
struct Session {
    access_token: String,
    instance_url: String,
}

/// `CrmWriter` (C7) over a Salesforce-shaped REST API. Authenticates lazily
/// on first use and caches the resulting session; a session-expired
/// response from the CRM triggers a single re-authentication and retry
/// rather than failing the whole call (§4.7).
pub struct CrmRestWriter {
    client: reqwest::Client,
    auth_url: String,
    api_base: String,
    client_id: String,
    client_secret: String,
    username: String,
    /// Password concatenated with the org's security token, per the
    /// Salesforce username-password OAuth flow this adapter targets.
    password_with_token: String,
    session: Mutex<Option<Session>>,
}

impl CrmRestWriter {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        auth_url: impl Into<String>,
        api_base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        security_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            api_base: api_base.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password_with_token: format!("{}{}", password.into(), security_token.into()),
            session: Mutex::new(None),
        }
    }

    async fn authenticate(&self) -> Result<Session, CrmError> {
        info!("authenticating against CRM");
        let response = self
            .client
            .post(&self.auth_url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("username", &self.username),
                ("password", &self.password_with_token),
            ])
            .send()
            .await
            .map_err(|e| CrmError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CrmError::Fatal(format!(
                "CRM auth rejected with status {}",
                response.status()
            )));
        }

        let parsed: AuthResponse = response
            .json()
            .await
            .map_err(|e| CrmError::Fatal(format!("malformed CRM auth response: {e}")))?;

        Ok(Session { access_token: parsed.access_token, instance_url: parsed.instance_url })
    }

    async fn session(&self) -> Result<Session, CrmError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }
        let session = self.authenticate().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    /// Drops the cached session so the next call re-authenticates.
    async fn invalidate_session(&self) {
        *self.session.lock().await = None;
    }

    async fn send_update(
        &self,
        session: &Session,
        crm_id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
        projection: &CrmProjection,
    ) -> Result<(), CrmError> {
        let body = build_update_body(score, breakdown, projection);

        let response = self
            .client
            .patch(format!(
                "{}{}/sobjects/Lead/{crm_id}",
                session.instance_url, self.api_base
            ))
            .bearer_auth(&session.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CrmError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::UNAUTHORIZED => Err(CrmError::SessionExpired),
            status if status.is_server_error() => {
                Err(CrmError::Transient(format!("CRM returned {status}")))
            }
            status => Err(CrmError::Fatal(format!("CRM rejected update with status {status}"))),
        }
    }
}

/// Builds the CRM update payload from the 9 projected fields (§4.6, §6).
fn build_update_body(
    score: u8,
    breakdown: &ScoreBreakdown,
    projection: &CrmProjection,
) -> serde_json::Value {
    serde_json::json!({
        "Fit_Score__c": score,
        "Fit_Score_Breakdown__c": breakdown,
        "Has_Website__c": projection.has_website,
        "Number_Of_Employees__c": projection.number_of_employees,
        "Number_Of_GBP_Reviews__c": projection.number_of_gbp_reviews,
        "Number_Of_Years_In_Business__c": projection.number_of_years_in_business,
        "Has_GMB__c": projection.has_gmb,
        "GMB_URL__c": projection.gmb_url,
        "Location_Type__c": projection.location_type,
        "Business_License__c": projection.business_license,
        "Spending_On_Marketing__c": projection.spending_on_marketing,
    })
}

#[async_trait]
impl CrmWriter for CrmRestWriter {
    async fn update(
        &self,
        crm_id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
        projection: &CrmProjection,
    ) -> Result<(), CrmError> {
        if !is_valid_crm_id(crm_id) {
            return Err(CrmError::InvalidId);
        }

        let session = self.session().await?;
        match self.send_update(&session, crm_id, score, breakdown, projection).await {
            Ok(()) => {
                debug!(crm_id, "CRM update succeeded");
                Ok(())
            }
            Err(CrmError::SessionExpired) => {
                warn!(crm_id, "CRM session expired, re-authenticating once");
                self.invalidate_session().await;
                let session = self.session().await?;
                self.send_update(&session, crm_id, score, breakdown, projection).await
            }
            Err(err) => Err(err),
        }
    }
}

/// Shared, cloneable handle suitable for wiring into the orchestrator and
/// the health endpoint alike.
pub type SharedCrmWriter = Arc<CrmRestWriter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_crm_id_before_any_network_call() {
        let body = build_update_body(
            50,
            &ScoreBreakdown::default(),
            &CrmProjection {
                has_website: true,
                number_of_employees: None,
                number_of_gbp_reviews: None,
                number_of_years_in_business: None,
                has_gmb: false,
                gmb_url: None,
                location_type: None,
                business_license: None,
                spending_on_marketing: false,
            },
        );
        assert_eq!(body["Fit_Score__c"], 50);
        assert_eq!(body["Has_Website__c"], true);
        assert!(body["Business_License__c"].is_null());
    }
}
