//! Audit verification hash
//!
//! Fingerprint over the five semantic fields of an audit event:
//! `user_id`, `table_name`, `operation`, `accessed_data`, `created_at`.
//! Anyone holding the stored fields can recompute it, so later edits to a
//! log row are detectable.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// 计算审计条目的 SHA256 哈希（小写 hex，64 字符）
///
/// - 变长字段间用 `\x00` 分隔，防止 `("ab","cd")` 与 `("abc","d")` 碰撞
/// - `user_id` 用 `\x00`=None / `\x01`+bytes=Some 区分
/// - `accessed_data` 使用规范化紧凑 JSON（对象 key 递归排序）
/// - `created_at` 取微秒精度，LE 字节序（与 PostgreSQL timestamptz 一致）
pub fn compute_audit_hash(
    user_id: Option<&Uuid>,
    table_name: &str,
    operation: &str,
    accessed_data: &serde_json::Value,
    created_at: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();

    match user_id {
        Some(id) => {
            hasher.update(b"\x01");
            hasher.update(id.hyphenated().to_string().as_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    hasher.update(b"\x00");

    hasher.update(table_name.as_bytes());
    hasher.update(b"\x00");
    hasher.update(operation.as_bytes());
    hasher.update(b"\x00");

    hasher.update(canonical_json(accessed_data).as_bytes());
    hasher.update(b"\x00");

    hasher.update(created_at.timestamp_micros().to_le_bytes());

    format!("{:x}", hasher.finalize())
}

/// Compact JSON with object keys sorted at every level
///
/// Output must not depend on serde_json's `preserve_order` feature.
fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    struct Fields {
        user_id: Option<Uuid>,
        table_name: String,
        operation: String,
        accessed_data: serde_json::Value,
        created_at: DateTime<Utc>,
    }

    impl Fields {
        fn base() -> Self {
            Self {
                user_id: Some(Uuid::from_u128(0x6f1c_2b1e_8d3a_4c55_9d0e_0a1b_2c3d_4e5f)),
                table_name: "contacts".to_string(),
                operation: "read".to_string(),
                accessed_data: json!({ "contact_id": 7 }),
                created_at: Utc.with_ymd_and_hms(2025, 7, 12, 21, 30, 0).unwrap(),
            }
        }

        fn hash(&self) -> String {
            compute_audit_hash(
                self.user_id.as_ref(),
                &self.table_name,
                &self.operation,
                &self.accessed_data,
                &self.created_at,
            )
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = Fields::base().hash();
        let b = Fields::base().hash();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_each_field_changes_hash() {
        let base = Fields::base().hash();

        let mut f = Fields::base();
        f.user_id = Some(Uuid::nil());
        assert_ne!(f.hash(), base, "user_id");

        let mut f = Fields::base();
        f.table_name = "profiles".to_string();
        assert_ne!(f.hash(), base, "table_name");

        let mut f = Fields::base();
        f.operation = "delete".to_string();
        assert_ne!(f.hash(), base, "operation");

        let mut f = Fields::base();
        f.accessed_data = json!({ "contact_id": 8 });
        assert_ne!(f.hash(), base, "accessed_data");

        let mut f = Fields::base();
        f.created_at += chrono::Duration::microseconds(1);
        assert_ne!(f.hash(), base, "created_at");
    }

    #[test]
    fn test_none_user_differs_from_empty() {
        let mut with_none = Fields::base();
        with_none.user_id = None;
        let mut with_nil = Fields::base();
        with_nil.user_id = Some(Uuid::nil());
        assert_ne!(with_none.hash(), with_nil.hash());
    }

    #[test]
    fn test_field_boundaries_do_not_collide() {
        let mut a = Fields::base();
        a.table_name = "ab".to_string();
        a.operation = "cd".to_string();
        let mut b = Fields::base();
        b.table_name = "abc".to_string();
        b.operation = "d".to_string();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_json_key_order_is_irrelevant() {
        let mut a = Fields::base();
        a.accessed_data = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        let mut b = Fields::base();
        b.accessed_data = serde_json::from_str(r#"{"a":2,"b":1}"#).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"z":[{"y":1,"x":"q"}],"a":null}"#).unwrap();
        assert_eq!(canonical_json(&value), r#"{"a":null,"z":[{"x":"q","y":1}]}"#);
    }

    #[test]
    fn test_sub_microsecond_precision_is_ignored() {
        let mut a = Fields::base();
        a.created_at += chrono::Duration::nanoseconds(400);
        assert_eq!(a.hash(), Fields::base().hash());
    }
}
