use std::env;

pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "cognitivecomputations/dolphin-mistral-latest";
pub const DEFAULT_API_KEY_VAR: &str = "MY_SECRET_API_KEY";
pub const DEFAULT_PORT: u16 = 3000;

/// Process configuration, read from the environment at startup.
///
/// The credential itself is not part of this struct: only the name of the
/// variable holding it. Handlers read the value on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub upstream_url: String,
    pub model: String,
    pub api_key_var: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = non_empty("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let upstream_url =
            non_empty("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());

        let model = non_empty("RELAY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_key_var =
            non_empty("API_KEY_VAR").unwrap_or_else(|| DEFAULT_API_KEY_VAR.to_string());

        Self {
            port,
            upstream_url,
            model,
            api_key_var,
        }
    }
}
