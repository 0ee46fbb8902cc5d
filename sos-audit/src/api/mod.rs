//! HTTP surface
//!
//! | Method    | Path      | Handler                    |
//! |-----------|-----------|----------------------------|
//! | OPTIONS   | *         | CORS preflight (no batch)  |
//! | GET       | /health   | [`health::health`]         |
//! | GET       | /verify   | [`verify::verify`]         |
//! | any other | *         | [`process::process_queue`] |

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod cors;
pub mod health;
pub mod process;
pub mod verify;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/health",
            get(health::health).fallback(process::process_queue),
        )
        .route(
            "/verify",
            get(verify::verify).fallback(process::process_queue),
        )
        // 其余任意路径/方法都触发一次批处理
        .fallback(process::process_queue)
        .layer(cors::cors_layer())
        .layer(cors::allow_headers_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
