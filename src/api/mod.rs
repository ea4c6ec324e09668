mod handlers;
mod models;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::AppState;

pub use handlers::{chat, favicon, home, not_found};
pub use models::ErrorResponse;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/favicon.ico", get(favicon))
        .route("/api/chat", post(chat))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}
