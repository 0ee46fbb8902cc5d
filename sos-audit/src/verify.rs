//! 审计日志完整性校验
//!
//! 按 (created_at, id) keyset 分页读取 audit_logs，重算每条的 hash
//! 并与存储值比较。只读。

use shared::audit::{AuditHashMismatch, AuditVerification};
use shared::util::now_millis;

use crate::error::StoreResult;
use crate::store::{AuditStore, LogCursor};

/// Entries read per page
pub const VERIFY_PAGE_SIZE: i64 = 500;

pub async fn verify_log(store: &dyn AuditStore) -> StoreResult<AuditVerification> {
    verify_log_paged(store, VERIFY_PAGE_SIZE).await
}

pub async fn verify_log_paged(
    store: &dyn AuditStore,
    page_size: i64,
) -> StoreResult<AuditVerification> {
    let page_size = page_size.max(1);
    let mut cursor = None;
    let mut total_entries = 0u64;
    let mut mismatches = Vec::new();

    loop {
        let page = store.list_logs(page_size, cursor).await?;
        let fetched = page.len();

        for entry in &page {
            let expected = entry.recompute_hash();
            if expected != entry.hash_verification {
                tracing::warn!(entry_id = %entry.id, "Audit log entry failed hash verification");
                mismatches.push(AuditHashMismatch {
                    entry_id: entry.id,
                    expected_hash: expected,
                    stored_hash: entry.hash_verification.clone(),
                });
            }
        }

        total_entries += fetched as u64;
        if (fetched as i64) < page_size {
            break;
        }
        cursor = page.last().map(LogCursor::after);
    }

    tracing::info!(
        total_entries,
        mismatches = mismatches.len(),
        "Audit log verification complete"
    );

    Ok(AuditVerification {
        total_entries,
        intact: mismatches.is_empty(),
        mismatches,
        verified_at: now_millis(),
    })
}
