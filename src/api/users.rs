//! User CRUD endpoints. Every successful mutation is published to the
//! `user_updates` group.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{AppError, Result};
use crate::metrics::ApiMetrics;
use crate::notification::{ChangeEvent, USER_UPDATES_GROUP};
use crate::server::AppState;
use crate::users::{CreateUserRequest, StoreError, UpdateUserRequest, User};

/// Ids that do not parse as integers are reported as missing users
fn parse_user_id(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::NotFound(format!("User {} not found", raw)))
}

fn record_store_failure(err: StoreError) -> AppError {
    if matches!(err, StoreError::Validation(_)) {
        ApiMetrics::record_validation_failure();
    }
    err.into()
}

/// GET /api/users/ - List all users
#[tracing::instrument(name = "http.list_users", skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.store.list().await)
}

/// POST /api/users/ - Create a user
#[tracing::instrument(name = "http.create_user", skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    body: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    let Json(request) = body?;

    let user = state
        .store
        .create(request)
        .await
        .map_err(record_store_failure)?;

    let result = state
        .notifier
        .publish(USER_UPDATES_GROUP, ChangeEvent::created(user.clone()))
        .await;
    ApiMetrics::record_mutation(result.action);

    tracing::info!(
        user_id = user.id,
        recipients = result.recipients(),
        "User created"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/{id}/ - Get a single user
#[tracing::instrument(name = "http.get_user", skip(state))]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<User>> {
    let id = parse_user_id(&id)?;
    let user = state.store.get(id).await?;
    Ok(Json(user))
}

/// PATCH /api/users/{id}/ - Partially update a user
#[tracing::instrument(name = "http.update_user", skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<User>> {
    let id = parse_user_id(&id)?;
    let Json(request) = body?;

    let user = state
        .store
        .update(id, request)
        .await
        .map_err(record_store_failure)?;

    let result = state
        .notifier
        .publish(USER_UPDATES_GROUP, ChangeEvent::updated(user.clone()))
        .await;
    ApiMetrics::record_mutation(result.action);

    tracing::info!(
        user_id = user.id,
        recipients = result.recipients(),
        "User updated"
    );

    Ok(Json(user))
}

/// DELETE /api/users/{id}/ - Delete a user
#[tracing::instrument(name = "http.delete_user", skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_user_id(&id)?;
    let removed = state.store.delete(id).await?;

    let result = state
        .notifier
        .publish(USER_UPDATES_GROUP, ChangeEvent::deleted(removed.id))
        .await;
    ApiMetrics::record_mutation(result.action);

    tracing::info!(
        user_id = removed.id,
        recipients = result.recipients(),
        "User deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
