pub mod adapter;
pub mod audit;
pub mod circuit_breaker;
pub mod context;
pub mod crm;
pub mod error;
pub mod facts;
pub mod identity;
pub mod orchestrator;
pub mod projection;
pub mod retry;
pub mod score;

pub use adapter::{CrmWriter, SourceAdapter};
pub use audit::{AuditRow, AuditStore, NewAuditRow};
pub use circuit_breaker::{
    BreakerError, BreakerState, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus,
};
pub use context::RequestContext;
pub use crm::{CRM_ID_PREFIX, is_valid_crm_id};
pub use error::{AuditStoreError, CrmError, EnrichError, EnrichmentStatus, SourceError};
pub use facts::{CompanyFacts, EnrichmentRecord, PlacesFacts, WebTechFacts};
pub use identity::{IdentityValidationError, LeadIdentity};
pub use orchestrator::{CrmUpdateStatus, EnrichResponse, Orchestrator, SourcePipeline};
pub use projection::{CrmProjection, project};
pub use retry::{RetryError, RetryPolicy, retry};
pub use score::{PixelBonus, ScoreBreakdown, SolvencyBreakdown, score};
