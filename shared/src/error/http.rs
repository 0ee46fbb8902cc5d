//! HTTP status per error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            // 瞬时故障，调用方可重试
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,
            Self::AuditQueueFetchFailed
            | Self::AuditHashFailed
            | Self::AuditLogInsertFailed
            | Self::AuditMarkFailed
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
