//! 托管 REST 后端实现 (PostgREST 风格)
//!
//! 特权 service key 同时作为 `apikey` 与 Bearer token 发送。
//! 无多语句事务：insert 与 mark 依次执行（至少一次语义）。

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use shared::audit::{AuditLogEntry, AuditQueueItem, NewAuditLogEntry};
use std::time::Duration;
use uuid::Uuid;

use super::{AuditStore, LogCursor};
use crate::error::{StoreError, StoreResult};

#[derive(Clone)]
pub struct RestAuditStore {
    client: Client,
    /// `<project url>/rest/v1`
    base_url: String,
}

impl RestAuditStore {
    pub fn new(url: &str, service_key: &str) -> StoreResult<Self> {
        Self::with_builder(Client::builder(), url, service_key)
    }

    fn with_builder(builder: ClientBuilder, url: &str, service_key: &str) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(service_key)
            .map_err(|_| StoreError::Backend("service key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {service_key}"))
            .map_err(|_| StoreError::Backend("service key is not a valid header value".into()))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = builder
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn send(request: RequestBuilder) -> StoreResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// PostgREST error bodies look like `{"message": "...", "code": "...", ...}`
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// PostgREST form of `(created_at, id) > (cursor.created_at, cursor.id)`
fn keyset_filter(cursor: &LogCursor) -> String {
    let ts = cursor.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    format!(
        "(created_at.gt.{ts},and(created_at.eq.{ts},id.gt.{}))",
        cursor.id
    )
}

#[async_trait]
impl AuditStore for RestAuditStore {
    async fn fetch_pending(&self, limit: i64) -> StoreResult<Vec<AuditQueueItem>> {
        let limit = limit.to_string();
        let request = self.client.get(self.table_url("audit_queue")).query(&[
            ("select", "*"),
            ("processed", "eq.false"),
            ("order", "created_at.asc"),
            ("limit", limit.as_str()),
        ]);
        Ok(Self::send(request).await?.json().await?)
    }

    async fn insert_log(&self, entry: &NewAuditLogEntry) -> StoreResult<()> {
        let request = self
            .client
            .post(self.table_url("audit_logs"))
            .header("Prefer", "return=minimal")
            .json(entry);
        Self::send(request).await?;
        Ok(())
    }

    async fn mark_processed(&self, id: Uuid) -> StoreResult<()> {
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .patch(self.table_url("audit_queue"))
            .query(&[("id", id_filter.as_str()), ("processed", "eq.false")])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "processed": true }));

        let updated: Vec<serde_json::Value> = Self::send(request).await?.json().await?;
        if updated.is_empty() {
            return Err(StoreError::AlreadyProcessed(id));
        }
        Ok(())
    }

    async fn list_logs(
        &self,
        limit: i64,
        after: Option<LogCursor>,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "created_at.asc,id.asc".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = after {
            query.push(("or", keyset_filter(&cursor)));
        }
        let request = self.client.get(self.table_url("audit_logs")).query(&query);
        Ok(Self::send(request).await?.json().await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        let request = self
            .client
            .get(self.table_url("audit_queue"))
            .query(&[("select", "id"), ("limit", "1")]);
        Self::send(request).await?;
        Ok(())
    }
}
