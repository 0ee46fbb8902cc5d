//! Memory 存储实现 (同进程)
//!
//! 用于测试与本地调试。支持按条目注入故障。
//! `commit_item` 原子执行，行为与 PostgreSQL 事务一致。

use async_trait::async_trait;
use shared::audit::{AuditLogEntry, AuditQueueItem, NewAuditLogEntry};
use shared::util::truncate_to_micros;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{AuditStore, CommitError, LogCursor};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Faults {
    fetch: bool,
    hash: HashSet<Uuid>,
    insert: HashSet<Uuid>,
    mark: HashSet<Uuid>,
}

#[derive(Debug, Default)]
struct MemoryState {
    queue: Vec<AuditQueueItem>,
    logs: Vec<AuditLogEntry>,
    faults: Faults,
    yield_before_commit: bool,
}

/// In-process audit store
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = AuditQueueItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.push(item);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enqueue an item (timestamp truncated to storage precision)
    pub fn push(&self, mut item: AuditQueueItem) {
        item.created_at = truncate_to_micros(item.created_at);
        self.lock().queue.push(item);
    }

    /// Current queue contents, insertion order
    pub fn queue(&self) -> Vec<AuditQueueItem> {
        self.lock().queue.clone()
    }

    /// Current log contents, append order
    pub fn logs(&self) -> Vec<AuditLogEntry> {
        self.lock().logs.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().queue.iter().filter(|i| !i.processed).count()
    }

    /// Make every fetch fail (simulated backend outage)
    pub fn fail_fetch(&self, fail: bool) {
        self.lock().faults.fetch = fail;
    }

    pub fn fail_hash(&self, id: Uuid) {
        self.lock().faults.hash.insert(id);
    }

    pub fn fail_insert(&self, id: Uuid) {
        self.lock().faults.insert.insert(id);
    }

    pub fn fail_mark(&self, id: Uuid) {
        self.lock().faults.mark.insert(id);
    }

    /// Yield to the scheduler at the start of every `commit_item`, letting
    /// concurrent runs fetch the same batch before either commits
    pub fn yield_before_commit(&self, enabled: bool) {
        self.lock().yield_before_commit = enabled;
    }

    pub fn clear_faults(&self) {
        self.lock().faults = Faults::default();
    }

    /// Edit a stored log entry in place, bypassing the append-only contract
    pub fn tamper_log<F>(&self, id: Uuid, edit: F) -> bool
    where
        F: FnOnce(&mut AuditLogEntry),
    {
        let mut state = self.lock();
        match state.logs.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                edit(entry);
                true
            }
            None => false,
        }
    }
}

fn insert_in(state: &mut MemoryState, entry: &NewAuditLogEntry) -> StoreResult<()> {
    if state.faults.insert.contains(&entry.source_id) {
        return Err(StoreError::Backend(format!(
            "simulated insert failure on {}",
            entry.source_id
        )));
    }
    state
        .logs
        .push(AuditLogEntry::from_new(Uuid::new_v4(), entry.clone()));
    Ok(())
}

fn mark_in(state: &mut MemoryState, id: Uuid) -> StoreResult<()> {
    if state.faults.mark.contains(&id) {
        return Err(StoreError::Backend(format!("simulated update failure on {id}")));
    }
    let item = state
        .queue
        .iter_mut()
        .find(|i| i.id == id)
        .ok_or(StoreError::NotFound(id))?;
    if item.processed {
        return Err(StoreError::AlreadyProcessed(id));
    }
    item.processed = true;
    Ok(())
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn fetch_pending(&self, limit: i64) -> StoreResult<Vec<AuditQueueItem>> {
        let state = self.lock();
        if state.faults.fetch {
            return Err(StoreError::Backend("simulated backend outage".into()));
        }

        let mut pending: Vec<AuditQueueItem> = state
            .queue
            .iter()
            .filter(|i| !i.processed)
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.created_at);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn generate_hash(&self, item: &AuditQueueItem) -> StoreResult<String> {
        if self.lock().faults.hash.contains(&item.id) {
            return Err(StoreError::Backend(format!(
                "simulated hash failure on {}",
                item.id
            )));
        }
        Ok(item.verification_hash())
    }

    async fn insert_log(&self, entry: &NewAuditLogEntry) -> StoreResult<()> {
        insert_in(&mut self.lock(), entry)
    }

    async fn mark_processed(&self, id: Uuid) -> StoreResult<()> {
        mark_in(&mut self.lock(), id)
    }

    async fn commit_item(&self, entry: &NewAuditLogEntry, id: Uuid) -> Result<(), CommitError> {
        let yield_first = self.lock().yield_before_commit;
        if yield_first {
            tokio::task::yield_now().await;
        }

        let mut state = self.lock();
        if state.faults.insert.contains(&id) {
            return Err(CommitError::Insert(StoreError::Backend(format!(
                "simulated insert failure on {id}"
            ))));
        }

        // mark first under the lock; nothing is appended if it fails
        mark_in(&mut state, id).map_err(CommitError::Mark)?;
        insert_in(&mut state, entry).map_err(CommitError::Insert)
    }

    async fn list_logs(
        &self,
        limit: i64,
        after: Option<LogCursor>,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let state = self.lock();
        let mut logs: Vec<AuditLogEntry> = state
            .logs
            .iter()
            .filter(|e| after.is_none_or(|c| (e.created_at, e.id) > (c.created_at, c.id)))
            .cloned()
            .collect();
        logs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        logs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(logs)
    }

    async fn ping(&self) -> StoreResult<()> {
        if self.lock().faults.fetch {
            return Err(StoreError::Backend("simulated backend outage".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn item(seq: i64) -> AuditQueueItem {
        AuditQueueItem {
            id: Uuid::new_v4(),
            user_id: None,
            table_name: "contacts".into(),
            operation: "read".into(),
            accessed_data: json!({ "seq": seq }),
            session_id: None,
            request_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 7, 12, 22, 0, 0).unwrap()
                + Duration::seconds(seq),
            processed: false,
        }
    }

    fn entry_for(item: &AuditQueueItem) -> NewAuditLogEntry {
        NewAuditLogEntry::from_item(item, item.verification_hash())
    }

    #[tokio::test]
    async fn test_insert_log_honors_insert_fault() {
        let bad = item(0);
        let store = MemoryAuditStore::with_items([bad.clone()]);
        store.fail_insert(bad.id);

        let err = store.insert_log(&entry_for(&bad)).await.unwrap_err();
        assert_eq!(err.to_string(), format!("simulated insert failure on {}", bad.id));
        assert!(store.logs().is_empty());

        store.clear_faults();
        store.insert_log(&entry_for(&bad)).await.unwrap();
        assert_eq!(store.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_twice_keeps_one_entry() {
        let target = item(0);
        let store = MemoryAuditStore::with_items([target.clone()]);
        let entry = entry_for(&target);

        store.commit_item(&entry, target.id).await.unwrap();
        let err = store.commit_item(&entry, target.id).await.unwrap_err();
        assert!(matches!(err, CommitError::Mark(StoreError::AlreadyProcessed(_))));
        assert_eq!(store.logs().len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_pages_ignore_older_late_entries() {
        let items: Vec<_> = (1..=4).map(item).collect();
        let store = MemoryAuditStore::with_items(items.clone());
        for i in &items {
            store.insert_log(&entry_for(i)).await.unwrap();
        }

        let first = store.list_logs(2, None).await.unwrap();
        assert_eq!(first.len(), 2);

        // 扫描途中写入一条更早的日志，后续页不受影响
        store.insert_log(&entry_for(&item(0))).await.unwrap();

        let second = store
            .list_logs(2, first.last().map(LogCursor::after))
            .await
            .unwrap();
        let seqs: Vec<_> = second.iter().map(|e| e.accessed_data["seq"].clone()).collect();
        assert_eq!(seqs, vec![json!(3), json!(4)]);
    }
}
