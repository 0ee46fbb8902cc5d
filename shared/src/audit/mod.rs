//! 审计队列 / 审计日志共享模型
//!
//! ```text
//! 应用数据访问
//!   └─ INSERT audit_queue (processed = false)
//!        └─ 审计处理器: hash → INSERT audit_logs → processed = true
//! ```
//!
//! `audit_logs` 为 append-only，`hash_verification` 可随时重算校验。

pub mod hash;
pub mod types;

pub use hash::compute_audit_hash;
pub use types::{
    AuditHashMismatch, AuditLogEntry, AuditQueueItem, AuditVerification, NewAuditLogEntry,
};
