//! Batch trigger

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;
use crate::processor::BatchReport;
use crate::state::AppState;

pub const NOTHING_TO_PROCESS: &str = "No audit items to process";
pub const PROCESSING_COMPLETE: &str = "Audit queue processing complete";

/// Success body of one invocation
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProcessResponse {
    pub message: String,
    pub processed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl From<BatchReport> for ProcessResponse {
    fn from(report: BatchReport) -> Self {
        if report.total == 0 {
            return Self {
                message: NOTHING_TO_PROCESS.to_string(),
                processed: 0,
                total: None,
                errors: None,
            };
        }

        let errors = report.error_messages();
        Self {
            message: PROCESSING_COMPLETE.to_string(),
            processed: report.processed,
            total: Some(report.total),
            errors: (!errors.is_empty()).then_some(errors),
        }
    }
}

pub async fn process_queue(
    State(state): State<AppState>,
) -> Result<Json<ProcessResponse>, ProcessError> {
    let report = state.processor()?.run().await?;
    Ok(Json(report.into()))
}
