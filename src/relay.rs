use std::{
    env::{self, VarError},
    error::Error as StdError,
};

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{api::ErrorResponse, AppState};

/// Upper bound on how much of an upstream error body is echoed to the caller.
pub const MAX_UPSTREAM_DETAIL_BYTES: usize = 1024;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("No prompt provided")]
    MissingPrompt,
    #[error("API key not configured")]
    MissingCredential,
    #[error("API request failed: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingPrompt => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(details) => error!(%details, "unexpected error while relaying"),
            Self::Upstream(details) => warn!(%details, "upstream request failed"),
            other => warn!(%status, error = %other, "rejected chat request"),
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Pulls `prompt` out of a raw request body.
///
/// Bodies that are not a JSON object are internal errors rather than client
/// errors; a missing, non-string or empty prompt is [`RelayError::MissingPrompt`].
pub fn extract_prompt(body: &[u8]) -> Result<String, RelayError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RelayError::Internal(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| RelayError::Internal("request body must be a JSON object".to_string()))?;

    match object.get("prompt") {
        Some(Value::String(prompt)) if !prompt.is_empty() => Ok(prompt.clone()),
        _ => Err(RelayError::MissingPrompt),
    }
}

/// Reads the upstream credential; the value is never cached.
pub fn read_credential(var: &str) -> Result<String, RelayError> {
    match env::var(var) {
        Ok(key) if !key.is_empty() => Ok(key),
        Ok(_) | Err(VarError::NotPresent) => Err(RelayError::MissingCredential),
        Err(VarError::NotUnicode(_)) => Err(RelayError::Internal(format!(
            "credential in {var} is not valid UTF-8"
        ))),
    }
}

/// Renders an error followed by each of its sources, joined by `": "`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut details = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !details.ends_with(&cause_text) {
            details.push_str(": ");
            details.push_str(&cause_text);
        }
        source = cause.source();
    }
    details
}

/// Cuts `text` to at most `max` bytes on a char boundary, marking the cut.
pub fn truncate_details(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}

pub fn chat_payload(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "user", "content": prompt }
        ]
    })
}

pub async fn relay_prompt(prompt: &str, state: &AppState) -> Result<Value, RelayError> {
    let api_key = read_credential(&state.api_key_var)?;

    debug!(model = %state.model, prompt_len = prompt.len(), "relaying prompt upstream");

    let response = state
        .client
        .post(&state.upstream_url)
        .bearer_auth(api_key)
        .header(CONTENT_TYPE, "application/json")
        .json(&chat_payload(&state.model, prompt))
        .send()
        .await
        .map_err(|e| RelayError::Upstream(error_chain(&e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body = truncate_details(body.trim(), MAX_UPSTREAM_DETAIL_BYTES);
        return Err(RelayError::Upstream(if body.is_empty() {
            format!("upstream responded with {status}")
        } else {
            format!("upstream responded with {status}: {body}")
        }));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| {
            RelayError::Upstream(format!("failed to read upstream body: {}", error_chain(&e)))
        })?;

    serde_json::from_slice(&body)
        .map_err(|e| RelayError::Upstream(format!("upstream returned invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prompt_from_object() {
        let prompt = extract_prompt(br#"{"prompt":"hi","ignored":true}"#).unwrap();
        assert_eq!(prompt, "hi");
    }

    #[test]
    fn missing_or_empty_prompt_is_a_client_error() {
        let bodies: [&[u8]; 4] = [
            br#"{}"#,
            br#"{"prompt":""}"#,
            br#"{"prompt":null}"#,
            br#"{"prompt":42}"#,
        ];
        for body in bodies {
            let err = extract_prompt(body).unwrap_err();
            assert!(matches!(err, RelayError::MissingPrompt), "{err:?}");
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn malformed_body_is_an_internal_error() {
        let err = extract_prompt(b"{not json").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("An unexpected error occurred: "));

        let err = extract_prompt(br#"["prompt"]"#).unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)));
    }

    #[test]
    fn credential_must_be_present_and_non_empty() {
        let var = "CHAT_RELAY_UNIT_TEST_CREDENTIAL";
        assert!(matches!(
            read_credential("CHAT_RELAY_UNIT_TEST_NEVER_SET"),
            Err(RelayError::MissingCredential)
        ));

        env::set_var(var, "");
        assert!(matches!(read_credential(var), Err(RelayError::MissingCredential)));

        env::set_var(var, "sk-test");
        assert_eq!(read_credential(var).unwrap(), "sk-test");
        env::remove_var(var);
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_credential_is_not_reported_as_missing() {
        use std::{ffi::OsString, os::unix::ffi::OsStringExt};

        let var = "CHAT_RELAY_UNIT_TEST_NON_UNICODE_CREDENTIAL";
        env::set_var(var, OsString::from_vec(vec![b's', b'k', 0xff, 0xfe]));

        let err = read_credential(var).unwrap_err();
        assert!(matches!(err, RelayError::Internal(_)), "{err:?}");
        assert!(err.to_string().contains("not valid UTF-8"));
        env::remove_var(var);
    }

    #[test]
    fn error_chain_includes_every_source() {
        #[derive(Debug, Error)]
        #[error("error sending request")]
        struct Outer(#[source] std::io::Error);

        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "Connection refused",
        ));
        assert_eq!(
            error_chain(&err),
            "error sending request: Connection refused"
        );
    }

    #[test]
    fn long_details_are_truncated_on_a_char_boundary() {
        assert_eq!(truncate_details("short", 16), "short");

        let long = "é".repeat(MAX_UPSTREAM_DETAIL_BYTES);
        let cut = truncate_details(&long, MAX_UPSTREAM_DETAIL_BYTES + 1);
        assert!(cut.ends_with("... (truncated)"));
        let kept = cut.trim_end_matches("... (truncated)");
        assert_eq!(kept.len(), MAX_UPSTREAM_DETAIL_BYTES);
        assert!(kept.chars().all(|c| c == 'é'));
    }

    #[test]
    fn payload_wraps_prompt_in_a_single_user_message() {
        let payload = chat_payload("some/model", "hello");
        assert_eq!(
            payload,
            json!({
                "model": "some/model",
                "messages": [{ "role": "user", "content": "hello" }]
            })
        );
    }

    #[test]
    fn error_messages_and_statuses() {
        assert_eq!(RelayError::MissingPrompt.to_string(), "No prompt provided");
        assert_eq!(
            RelayError::MissingCredential.to_string(),
            "API key not configured"
        );
        assert_eq!(
            RelayError::MissingCredential.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let upstream = RelayError::Upstream("boom".to_string());
        assert_eq!(upstream.to_string(), "API request failed: boom");
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
