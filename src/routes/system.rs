use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use crate::{db, state::AppState};

pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/db-test", get(db_test))
}

pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = &state.config;
    Json(json!({
        "message": format!("Welcome to {}", cfg.app_name),
        "version": cfg.app_version,
        "environment": cfg.environment,
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let cfg = &state.config;
    Json(json!({
        "status": "healthy",
        "app_name": cfg.app_name,
        "version": cfg.app_version,
        "environment": cfg.environment,
    }))
}

/// Connectivity check: server version plus public tables. 503 when the database is unreachable.
#[instrument(skip(state))]
pub async fn db_test(State(state): State<AppState>) -> Response {
    match db::describe(&state.db).await {
        Ok(report) => Json(json!({
            "connection_status": "connected",
            "database_info": { "version": report.version, "driver": "sqlx-postgres" },
            "tables": {
                "count": report.tables.len(),
                "list": report.tables.iter().map(|t| t.table_name.as_str()).collect::<Vec<_>>(),
                "details": report.tables,
            },
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "database check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "connection_status": "failed",
                    "detail": format!("{:#}", e),
                })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn health_reports_app_identity() {
        let state = AppState::fake();
        let resp = health(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["app_name"], "EduSportsConnect API");
        assert_eq!(v["version"], "1.0.0");
    }

    #[tokio::test]
    async fn root_welcomes() {
        let state = AppState::fake();
        let resp = root(State(state)).await.into_response();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["message"], "Welcome to EduSportsConnect API");
        assert_eq!(v["environment"], "development");
    }
}
