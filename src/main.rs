use chat_relay::{build_app, run_server, AppConfig, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env();
    info!(
        model = %config.model,
        upstream = %config.upstream_url,
        api_key_var = %config.api_key_var,
        "starting chat-relay"
    );

    let app = build_app(AppState::from_config(&config));
    run_server(app, config.port).await
}
