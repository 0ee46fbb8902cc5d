//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let backend = match state.store() {
        Err(_) => "unconfigured",
        Ok(store) => match store.ping().await {
            Ok(()) => "ok",
            Err(e) => {
                tracing::warn!(error = %e, "Audit backend unreachable");
                "unreachable"
            }
        },
    };

    Json(serde_json::json!({
        "status": if backend == "ok" { "ok" } else { "degraded" },
        "service": "sos-audit",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": backend,
    }))
}
