//! PostgreSQL 存储实现
//!
//! insert + mark 在同一事务内提交；mark 带 `processed = false` 守卫，
//! 并发调用抢到同一条时只有一个能提交。

use async_trait::async_trait;
use shared::audit::{AuditLogEntry, AuditQueueItem, NewAuditLogEntry};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Executor, Postgres};
use std::time::Duration;
use uuid::Uuid;

use super::{AuditStore, CommitError, LogCursor};
use crate::error::{StoreError, StoreResult};

const SELECT_PENDING: &str = "SELECT id, user_id, table_name, operation, accessed_data, \
     session_id, request_id, created_at, processed \
     FROM audit_queue \
     WHERE processed = false \
     ORDER BY created_at ASC \
     LIMIT $1";

const INSERT_LOG: &str = "INSERT INTO audit_logs \
     (user_id, table_name, operation, accessed_data, session_id, request_id, hash_verification, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const MARK_PROCESSED: &str =
    "UPDATE audit_queue SET processed = true WHERE id = $1 AND processed = false";

const SELECT_LOGS: &str = "SELECT id, user_id, table_name, operation, accessed_data, \
     session_id, request_id, hash_verification, created_at \
     FROM audit_logs \
     ORDER BY created_at ASC, id ASC \
     LIMIT $1";

const SELECT_LOGS_AFTER: &str = "SELECT id, user_id, table_name, operation, accessed_data, \
     session_id, request_id, hash_verification, created_at \
     FROM audit_logs \
     WHERE (created_at, id) > ($2, $3) \
     ORDER BY created_at ASC, id ASC \
     LIMIT $1";

/// 审计存储 (PostgreSQL)
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily-connecting pool: an unreachable database surfaces on the first
    /// query (the batch fetch), not at startup.
    pub fn connect_lazy(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2) // Lambda: one request at a time
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_lazy(database_url)?;
        Ok(Self::new(pool))
    }

    /// Run the bundled migrations (idempotent)
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))
    }

    async fn insert_with<'e, E>(executor: E, entry: &NewAuditLogEntry) -> StoreResult<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(INSERT_LOG)
            .bind(entry.user_id)
            .bind(&entry.table_name)
            .bind(&entry.operation)
            .bind(&entry.accessed_data)
            .bind(&entry.session_id)
            .bind(&entry.request_id)
            .bind(&entry.hash_verification)
            .bind(entry.created_at)
            .execute(executor)
            .await?;
        Ok(())
    }

    async fn mark_with<'e, E>(executor: E, id: Uuid) -> StoreResult<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(MARK_PROCESSED).bind(id).execute(executor).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyProcessed(id));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn fetch_pending(&self, limit: i64) -> StoreResult<Vec<AuditQueueItem>> {
        let items = sqlx::query_as::<_, AuditQueueItem>(SELECT_PENDING)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn insert_log(&self, entry: &NewAuditLogEntry) -> StoreResult<()> {
        Self::insert_with(&self.pool, entry).await
    }

    async fn mark_processed(&self, id: Uuid) -> StoreResult<()> {
        Self::mark_with(&self.pool, id).await
    }

    async fn commit_item(&self, entry: &NewAuditLogEntry, id: Uuid) -> Result<(), CommitError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CommitError::Insert(e.into()))?;

        Self::insert_with(&mut *tx, entry)
            .await
            .map_err(CommitError::Insert)?;

        // 守卫失败时 tx 被 drop，自动回滚，不留下重复日志
        Self::mark_with(&mut *tx, id)
            .await
            .map_err(CommitError::Mark)?;

        tx.commit()
            .await
            .map_err(|e| CommitError::Mark(e.into()))
    }

    async fn list_logs(
        &self,
        limit: i64,
        after: Option<LogCursor>,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let query = match after {
            None => sqlx::query_as::<_, AuditLogEntry>(SELECT_LOGS).bind(limit),
            Some(cursor) => sqlx::query_as::<_, AuditLogEntry>(SELECT_LOGS_AFTER)
                .bind(limit)
                .bind(cursor.created_at)
                .bind(cursor.id),
        };
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
