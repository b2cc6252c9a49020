//! Registration and admin user management.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthUser};
use crate::error::ExchangeError;
use crate::models::{RegisterRequest, User, UserResponse};
use crate::AppState;

/// POST /public/register
///
/// Creates a user and issues their API key. The key is only ever returned
/// here.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, ExchangeError> {
    req.validate()
        .map_err(|e| ExchangeError::Validation(e.to_string()))?;

    let api_key = auth::generate_api_key();
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (name, api_key)
        VALUES ($1, $2)
        RETURNING id, name, role, api_key, created_at
        "#,
    )
    .bind(&req.name)
    .bind(&api_key)
    .fetch_one(&state.db.pool)
    .await?;

    tracing::info!(user_id = %user.id, name = %user.name, "user registered");

    Ok(Json(user.into()))
}

/// DELETE /admin/user/{user_id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ExchangeError> {
    auth::require_admin(&auth_user)?;

    let user: Option<User> = sqlx::query_as(
        r#"
        DELETE FROM users
        WHERE id = $1
        RETURNING id, name, role, api_key, created_at
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db.pool)
    .await?;

    let user = user.ok_or(ExchangeError::UnknownUser(user_id))?;
    tracing::info!(%user_id, name = %user.name, admin = %auth_user.id, "user deleted");

    Ok(Json(user.into()))
}
