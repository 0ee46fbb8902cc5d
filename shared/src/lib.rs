//! Shared types for the Festival SOS backend
//!
//! Types used by the audit processor and anything else that reads the audit
//! tables: audit queue/log models, the verification hash, and the unified
//! error system.

pub mod audit;
pub mod error;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use audit::{AuditLogEntry, AuditQueueItem, NewAuditLogEntry, compute_audit_hash};
