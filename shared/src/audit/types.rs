//! Audit queue / audit log data model
//!
//! Column names map 1:1 to the `audit_queue` and `audit_logs` tables, so the
//! same structs serve sqlx rows and REST JSON bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hash::compute_audit_hash;

/// Pending data-access event written by the application
///
/// Mutable only through `processed`, which flips `false → true` once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AuditQueueItem {
    pub id: Uuid,
    /// Actor (None for system-initiated events)
    pub user_id: Option<Uuid>,
    /// Resource/domain accessed
    pub table_name: String,
    /// Action class tag (read / write / delete ...)
    pub operation: String,
    /// Opaque payload describing what was touched
    pub accessed_data: serde_json::Value,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    /// FIFO ordering key
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

impl AuditQueueItem {
    /// Verification hash over this item's semantic fields
    pub fn verification_hash(&self) -> String {
        compute_audit_hash(
            self.user_id.as_ref(),
            &self.table_name,
            &self.operation,
            &self.accessed_data,
            &self.created_at,
        )
    }
}

/// Log entry about to be appended (no backend id yet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditLogEntry {
    /// Queue item this entry was built from; not a log column
    #[serde(skip)]
    pub source_id: Uuid,
    pub user_id: Option<Uuid>,
    pub table_name: String,
    pub operation: String,
    pub accessed_data: serde_json::Value,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub hash_verification: String,
    pub created_at: DateTime<Utc>,
}

impl NewAuditLogEntry {
    /// Copy the item's fields and attach the precomputed hash
    pub fn from_item(item: &AuditQueueItem, hash_verification: String) -> Self {
        Self {
            source_id: item.id,
            user_id: item.user_id,
            table_name: item.table_name.clone(),
            operation: item.operation.clone(),
            accessed_data: item.accessed_data.clone(),
            session_id: item.session_id.clone(),
            request_id: item.request_id.clone(),
            hash_verification,
            created_at: item.created_at,
        }
    }
}

/// Stored audit log entry (append-only, never mutated)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub table_name: String,
    pub operation: String,
    pub accessed_data: serde_json::Value,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub hash_verification: String,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Materialize a stored entry from an insert payload
    pub fn from_new(id: Uuid, entry: NewAuditLogEntry) -> Self {
        Self {
            id,
            user_id: entry.user_id,
            table_name: entry.table_name,
            operation: entry.operation,
            accessed_data: entry.accessed_data,
            session_id: entry.session_id,
            request_id: entry.request_id,
            hash_verification: entry.hash_verification,
            created_at: entry.created_at,
        }
    }

    /// Re-derive the hash from the stored fields
    pub fn recompute_hash(&self) -> String {
        compute_audit_hash(
            self.user_id.as_ref(),
            &self.table_name,
            &self.operation,
            &self.accessed_data,
            &self.created_at,
        )
    }

    /// True when the stored hash still matches the stored fields
    pub fn is_intact(&self) -> bool {
        self.recompute_hash() == self.hash_verification
    }
}

/// Tamper-check summary over the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditVerification {
    /// Number of entries checked
    pub total_entries: u64,
    /// Every stored hash matched its recomputation
    pub intact: bool,
    /// Entries whose stored hash no longer matches
    pub mismatches: Vec<AuditHashMismatch>,
    /// When the check ran (Unix millis)
    pub verified_at: i64,
}

/// One entry that failed verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditHashMismatch {
    pub entry_id: Uuid,
    /// Hash recomputed from the stored fields
    pub expected_hash: String,
    /// Hash found in `hash_verification`
    pub stored_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_item() -> AuditQueueItem {
        AuditQueueItem {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            table_name: "contacts".to_string(),
            operation: "read".to_string(),
            accessed_data: json!({ "contact_id": 7, "fields": ["phone"] }),
            session_id: Some("sess-1".to_string()),
            request_id: None,
            created_at: Utc.with_ymd_and_hms(2025, 7, 12, 21, 30, 0).unwrap(),
            processed: false,
        }
    }

    #[test]
    fn test_log_entry_copies_item_fields() {
        let item = sample_item();
        let hash = item.verification_hash();
        let entry = NewAuditLogEntry::from_item(&item, hash.clone());

        assert_eq!(entry.source_id, item.id);
        assert_eq!(entry.user_id, item.user_id);
        assert_eq!(entry.table_name, "contacts");
        assert_eq!(entry.operation, "read");
        assert_eq!(entry.accessed_data, item.accessed_data);
        assert_eq!(entry.session_id.as_deref(), Some("sess-1"));
        assert_eq!(entry.request_id, None);
        assert_eq!(entry.created_at, item.created_at);
        assert_eq!(entry.hash_verification, hash);
    }

    #[test]
    fn test_source_id_is_not_serialized() {
        let item = sample_item();
        let entry = NewAuditLogEntry::from_item(&item, item.verification_hash());
        let body = serde_json::to_value(&entry).unwrap();
        assert!(body.get("source_id").is_none());
        assert_eq!(body["hash_verification"], entry.hash_verification);
    }

    #[test]
    fn test_stored_entry_is_intact_until_tampered() {
        let item = sample_item();
        let new_entry = NewAuditLogEntry::from_item(&item, item.verification_hash());
        let mut stored = AuditLogEntry::from_new(Uuid::new_v4(), new_entry);
        assert!(stored.is_intact());

        stored.accessed_data = json!({ "contact_id": 8, "fields": ["phone"] });
        assert!(!stored.is_intact());
    }

    #[test]
    fn test_session_and_request_ids_are_not_hashed() {
        let item = sample_item();
        let mut other = item.clone();
        other.session_id = Some("sess-2".to_string());
        other.request_id = Some("req-9".to_string());
        assert_eq!(item.verification_hash(), other.verification_hash());
    }

    #[test]
    fn test_queue_item_deserializes_without_processed_flag() {
        let raw = json!({
            "id": "6f1c2b1e-8d3a-4c55-9d0e-0a1b2c3d4e5f",
            "user_id": null,
            "table_name": "contacts",
            "operation": "write",
            "accessed_data": { "name": "Ana" },
            "session_id": null,
            "request_id": "req-1",
            "created_at": "2025-07-12T21:30:00.123456Z"
        });
        let item: AuditQueueItem = serde_json::from_value(raw).unwrap();
        assert!(!item.processed);
        assert!(item.user_id.is_none());
        assert_eq!(item.created_at.timestamp_subsec_micros(), 123_456);
    }
}
