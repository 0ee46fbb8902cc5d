//! Error codes
//!
//! - 0: success
//! - 4xxx: audit pipeline (one code per processing stage)
//! - 9xxx: system / infrastructure

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error code carried in `ApiResponse.code` and in log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,

    // ==================== 4xxx: Audit ====================
    /// Pending audit items could not be fetched
    AuditQueueFetchFailed = 4001,
    /// Verification hash could not be generated
    AuditHashFailed = 4002,
    /// Audit log entry could not be written
    AuditLogInsertFailed = 4003,
    /// Queue item could not be marked processed
    AuditMarkFailed = 4004,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    DatabaseError = 9002,
    ConfigError = 9003,
    NetworkError = 9101,
    TimeoutError = 9102,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// u16 that names no [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            4001 => ErrorCode::AuditQueueFetchFailed,
            4002 => ErrorCode::AuditHashFailed,
            4003 => ErrorCode::AuditLogInsertFailed,
            4004 => ErrorCode::AuditMarkFailed,
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::ConfigError,
            9101 => ErrorCode::NetworkError,
            9102 => ErrorCode::TimeoutError,
            _ => return Err(InvalidErrorCode(value)),
        };
        Ok(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
