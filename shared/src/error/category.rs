use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Domain of an error code, derived from its numeric range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// 0
    General,
    /// 4xxx
    Audit,
    /// everything else
    System,
}

impl ErrorCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            4000..5000 => Self::Audit,
            _ => Self::System,
        }
    }

    /// Log field value
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Audit => "audit",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}
