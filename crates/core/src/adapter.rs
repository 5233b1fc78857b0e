use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{CrmError, SourceError};
use crate::identity::LeadIdentity;
use crate::projection::CrmProjection;
use crate::score::ScoreBreakdown;

/// Uniform contract over the three heterogeneous source adapters (C3, §4.3).
///
/// Implementations are responsible for mapping the identity to the source's
/// query shape, invoking it under the adapter's own hard timeout raced
/// against `ctx`'s cancellation token (§5(c)), and translating the response
/// into `Facts`. They return `Ok(None)` on an empty/no-match result; `Err` is
/// reserved for conditions the orchestrator must isolate (timeouts, transport
/// failures, breaker-open).
#[async_trait]
pub trait SourceAdapter<Facts>: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn enrich(
        &self,
        identity: &LeadIdentity,
        ctx: &RequestContext,
    ) -> Result<Option<Facts>, SourceError>;
}

/// CRM writer contract (C7, §4.7). `update` is idempotent: repeated calls
/// with identical payload are safe because the external CRM performs
/// last-writer-wins.
#[async_trait]
pub trait CrmWriter: Send + Sync {
    async fn update(
        &self,
        crm_id: &str,
        score: u8,
        breakdown: &ScoreBreakdown,
        projection: &CrmProjection,
    ) -> Result<(), CrmError>;
}
