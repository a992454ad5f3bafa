//! HTTP hosting for the callback endpoint.
//!
//! The platform calls one path: `GET` for URL verification, `POST` for
//! message and event pushes. Replies are written synchronously in the POST
//! response.

pub mod handlers;
pub mod response;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use handlers::{health, verify_url, wechat_callback, AppState, HealthResponse, WebhookResponse};
pub use response::{write_content_type, ResponseWriter};

/// Build the router serving `/health` and the configured callback path.
pub fn router(state: AppState) -> Router {
    let callback_path = state.config.callback_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(&callback_path, get(verify_url).post(wechat_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
