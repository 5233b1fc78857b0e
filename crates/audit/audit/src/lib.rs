//! Thin re-export of the audit row type and store trait.
//!
//! `AuditRow`, `NewAuditRow` and `AuditStore` are defined in `leadfit-core`
//! rather than here, since the orchestrator depends on the trait directly
//! and a separate crate would create a cycle back into core. This crate
//! exists so storage backends (`leadfit-audit-memory`, `leadfit-audit-postgres`)
//! depend on one stable, narrow surface instead of the whole of core.

pub use leadfit_core::{AuditRow, AuditStore, AuditStoreError, NewAuditRow};
