//! AuditStore 存储层抽象
//!
//! ```text
//!         ┌────────────────────┐
//!         │  AuditStore Trait  │  ◄── 可插拔接口
//!         └────────┬───────────┘
//!                  │
//!     ┌────────────┼─────────────┐
//!     ▼            ▼             ▼
//! PgAuditStore  RestAuditStore  MemoryAuditStore
//! (sqlx 事务)   (托管 REST)     (测试/本地)
//! ```

mod memory;
mod postgres;
mod rest;

pub use memory::MemoryAuditStore;
pub use postgres::PgAuditStore;
pub use rest::RestAuditStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::audit::{AuditLogEntry, AuditQueueItem, NewAuditLogEntry};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Which half of the insert + mark commit failed
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Insert(StoreError),
    #[error(transparent)]
    Mark(StoreError),
}

/// Keyset position in `audit_logs`
///
/// A page requested with a cursor holds only entries strictly after
/// `(created_at, id)`, so rows appended during a scan never shift a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl LogCursor {
    pub fn after(entry: &AuditLogEntry) -> Self {
        Self {
            created_at: entry.created_at,
            id: entry.id,
        }
    }
}

/// Backend holding the `audit_queue` and `audit_logs` tables
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Oldest-first unprocessed items, at most `limit`
    async fn fetch_pending(&self, limit: i64) -> StoreResult<Vec<AuditQueueItem>>;

    /// Verification hash for an item
    ///
    /// Computed locally by default; a backend may delegate to a server-side
    /// routine as long as the hashed field set stays the same.
    async fn generate_hash(&self, item: &AuditQueueItem) -> StoreResult<String> {
        Ok(item.verification_hash())
    }

    /// Append one entry to `audit_logs`
    async fn insert_log(&self, entry: &NewAuditLogEntry) -> StoreResult<()>;

    /// Flip `processed` to true
    async fn mark_processed(&self, id: Uuid) -> StoreResult<()>;

    /// Insert the log entry, then mark the item processed
    ///
    /// The mark never happens unless the insert succeeded. Backends with
    /// transactions override this so both land together or not at all.
    async fn commit_item(&self, entry: &NewAuditLogEntry, id: Uuid) -> Result<(), CommitError> {
        self.insert_log(entry).await.map_err(CommitError::Insert)?;
        self.mark_processed(id).await.map_err(CommitError::Mark)
    }

    /// Stored log entries ordered by `(created_at, id)`, starting after `after`
    async fn list_logs(
        &self,
        limit: i64,
        after: Option<LogCursor>,
    ) -> StoreResult<Vec<AuditLogEntry>>;

    /// Backend reachability (health endpoint)
    async fn ping(&self) -> StoreResult<()>;
}
