use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::{
    relay::{self, RelayError},
    AppState,
};

use super::models::ErrorResponse;

const LANDING_PAGE: &str = include_str!("../../static/index.html");

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, RelayError> {
    let prompt = relay::extract_prompt(&body)?;
    let answer = relay::relay_prompt(&prompt, &state).await?;
    Ok(Json(answer))
}

pub async fn home() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

pub async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".to_string(),
        }),
    )
        .into_response()
}
