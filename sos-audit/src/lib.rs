//! sos-audit - 审计队列处理服务
//!
//! 周期性调用：把 `audit_queue` 中待处理的访问事件计算校验 hash 后写入
//! 只追加的 `audit_logs`，再标记为已处理。

pub mod api;
pub mod config;
pub mod error;
pub mod processor;
pub mod state;
pub mod store;
pub mod verify;

pub use config::Config;
pub use error::{ProcessError, StoreError};
pub use processor::{AuditQueueProcessor, BatchReport, ItemFailure};
pub use state::AppState;
pub use store::{AuditStore, MemoryAuditStore};
