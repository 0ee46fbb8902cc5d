use axum::extract::State;
use shared::audit::AuditVerification;
use shared::error::{ApiResponse, AppResult};

use crate::state::AppState;

/// GET /verify - 重算全部日志 hash
pub async fn verify(State(state): State<AppState>) -> AppResult<ApiResponse<AuditVerification>> {
    let store = state.store()?;
    let result = crate::verify::verify_log(store.as_ref()).await?;
    Ok(ApiResponse::success(result))
}
