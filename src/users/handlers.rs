use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreateUserRequest, Pagination, UpdateUserRequest};
use super::repo::User;
use super::services::{normalize_email, validate_changes, validate_new_user, validate_page};
use crate::{errors::AppError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/email/:email", get(get_user_by_email))
}

fn missing(user_id: i64) -> AppError {
    AppError::not_found(format!("User with id {} not found", user_id))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<User>>, AppError> {
    let (skip, limit) = validate_page(&p)?;
    Ok(Json(User::list(&state.db, skip, limit).await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, AppError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| missing(user_id))
}

#[instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<User>, AppError> {
    let email = normalize_email(&email)?;
    User::find_by_email(&state.db, &email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("User with email {} not found", email)))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let (name, email) = validate_new_user(&payload)?;
    let user = User::create(&state.db, &name, &email).await?;
    info!(user_id = user.id, email = %user.email, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let changes = validate_changes(payload)?;
    let user = User::update(&state.db, user_id, &changes)
        .await?
        .ok_or_else(|| missing(user_id))?;
    info!(user_id, "user updated");
    Ok(Json(user))
}

/// 204 when a row was removed, 404 when there was nothing to remove.
#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if User::delete(&state.db, user_id).await? {
        info!(user_id, "user deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(missing(user_id))
    }
}

#[cfg(test)]
mod user_tests {
    use super::*;
    use time::OffsetDateTime;

    #[test]
    fn user_serializes_with_rfc3339_timestamps() {
        let user = User {
            id: 7,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: None,
        };
        let v = serde_json::to_value(&user).unwrap();
        assert_eq!(v["id"], 7);
        assert_eq!(v["email"], "ada@example.com");
        assert_eq!(v["created_at"], "1970-01-01T00:00:00Z");
        assert!(v["updated_at"].is_null());
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_touching_the_pool() {
        let state = AppState::fake();
        let err = create_user(
            State(state),
            Json(CreateUserRequest {
                name: "Ada".into(),
                email: "nope".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn bad_pagination_is_rejected() {
        let state = AppState::fake();
        let err = list_users(State(state), Query(Pagination { skip: 0, limit: 5000 }))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
