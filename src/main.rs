mod app;
mod config;
mod db;
mod errors;
mod images;
mod routes;
mod state;
mod storage;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "sportsconnect=debug,axum=info,tower_http=info".to_string());
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

    let app_state = AppState::init().await?;
    tracing::info!(
        app = %app_state.config.app_name,
        version = %app_state.config.app_version,
        environment = %app_state.config.environment,
        bucket = %app_state.config.s3.bucket,
        metadata = app_state.metadata.is_some(),
        "starting"
    );
    if app_state.config.secret_key.is_none() && app_state.config.environment == "production" {
        tracing::warn!("SECRET_KEY is not set in production");
    }

    if let Err(e) = db::run_migrations(&app_state.db).await {
        tracing::warn!(error = %e, "migrations failed; continuing");
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
