//! HTTP relay that forwards a prompt to a chat-completion API.
//!
//! `POST /api/chat` takes `{"prompt": "..."}`, attaches the server-held bearer
//! credential and relays the upstream JSON (or an `{"error": ...}` body) back.

pub mod api;
pub mod config;
pub mod relay;

use std::{io, sync::Arc};

use axum::Router;
use tracing::info;

pub use config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub upstream_url: String,
    pub model: String,
    pub api_key_var: String,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Arc<Self> {
        Arc::new(Self {
            upstream_url: config.upstream_url.clone(),
            model: config.model.clone(),
            api_key_var: config.api_key_var.clone(),
            client: reqwest::Client::new(),
        })
    }
}

pub fn build_app(state: Arc<AppState>) -> Router {
    api::router(state)
}

pub async fn run_server(app: Router, port: u16) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "chat-relay listening");

    axum::serve(listener, app).await
}
