//! 审计队列处理器
//!
//! 每次调用：取最早的一批未处理条目（最多 100 条），逐条执行
//! hash → 写 audit_logs → 标记 processed。单条失败只记录错误并跳过，
//! 不影响后续条目；取批失败则整个调用失败，不触碰任何条目。

use shared::audit::{AuditQueueItem, NewAuditLogEntry};
use shared::error::ErrorCode;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::MAX_BATCH_SIZE;
use crate::error::{ProcessError, StoreError};
use crate::store::{AuditStore, CommitError};

/// Per-item failure; Display is the message reported to the caller
#[derive(Debug, Error)]
pub enum ItemFailure {
    #[error("Hash generation failed for {id}: {source}")]
    Hash { id: Uuid, source: StoreError },
    #[error("Audit log insertion failed for {id}: {source}")]
    Insert { id: Uuid, source: StoreError },
    #[error("Failed to mark {id} as processed: {source}")]
    Mark { id: Uuid, source: StoreError },
}

impl ItemFailure {
    /// Stage-specific error code (log field)
    pub fn code(&self) -> ErrorCode {
        match self {
            ItemFailure::Hash { .. } => ErrorCode::AuditHashFailed,
            ItemFailure::Insert { .. } => ErrorCode::AuditLogInsertFailed,
            ItemFailure::Mark { .. } => ErrorCode::AuditMarkFailed,
        }
    }

    pub fn item_id(&self) -> Uuid {
        match self {
            ItemFailure::Hash { id, .. }
            | ItemFailure::Insert { id, .. }
            | ItemFailure::Mark { id, .. } => *id,
        }
    }
}

/// Outcome of one invocation
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items fully committed (hashed, logged, marked)
    pub processed: usize,
    /// Items fetched in this batch
    pub total: usize,
    /// Failures in processing order
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn error_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }
}

pub struct AuditQueueProcessor {
    store: Arc<dyn AuditStore>,
    batch_size: i64,
}

impl AuditQueueProcessor {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            batch_size: MAX_BATCH_SIZE,
        }
    }

    /// Override the batch size (clamped to 1..=100)
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Drain one batch of the queue
    pub async fn run(&self) -> Result<BatchReport, ProcessError> {
        tracing::info!("Processing audit queue...");

        let items = self
            .store
            .fetch_pending(self.batch_size)
            .await
            .map_err(ProcessError::Fetch)?;

        if items.is_empty() {
            tracing::info!("No audit items to process");
            return Ok(BatchReport::default());
        }

        tracing::info!(count = items.len(), "Processing audit items");

        let mut report = BatchReport {
            total: items.len(),
            ..Default::default()
        };

        // 严格顺序：每条的 log 写入必须先于其 processed 标记
        for item in &items {
            match self.process_item(item).await {
                Ok(()) => {
                    report.processed += 1;
                    tracing::debug!(item_id = %item.id, "Audit item processed");
                }
                Err(failure) => {
                    tracing::error!(
                        item_id = %item.id,
                        code = %failure.code(),
                        error = %failure,
                        "Audit item failed"
                    );
                    report.failures.push(failure);
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            errors = report.failures.len(),
            "Audit queue processing complete"
        );

        Ok(report)
    }

    async fn process_item(&self, item: &AuditQueueItem) -> Result<(), ItemFailure> {
        let hash = self
            .store
            .generate_hash(item)
            .await
            .map_err(|source| ItemFailure::Hash {
                id: item.id,
                source,
            })?;

        let entry = NewAuditLogEntry::from_item(item, hash);

        self.store
            .commit_item(&entry, item.id)
            .await
            .map_err(|e| match e {
                CommitError::Insert(source) => ItemFailure::Insert {
                    id: item.id,
                    source,
                },
                CommitError::Mark(source) => ItemFailure::Mark {
                    id: item.id,
                    source,
                },
            })
    }
}
