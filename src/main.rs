use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod flash;
mod moods;
mod state;
mod storage;
mod views;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "moodlog=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = config::AppConfig::from_env().context("load configuration")?;
    let addr = config.listen_addr()?;
    let app_state = state::AppState::init(config).await?;
    let storage = app_state.storage.clone();

    let result = app::serve(app::build_app(app_state), addr).await;

    storage.close().await;
    tracing::info!("storage closed");
    result
}
