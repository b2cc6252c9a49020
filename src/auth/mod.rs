//! API-key authentication.
//!
//! Every protected route expects `Authorization: TOKEN <api_key>`; the
//! middleware resolves the key against the user table and stores the
//! authenticated principal in the request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::Role;
use crate::AppState;

/// Scheme prefix of the `Authorization` header.
pub const API_KEY_SCHEME: &str = "TOKEN";

/// Length of generated API keys.
const API_KEY_LEN: usize = 43;

/// The authenticated principal attached to each protected request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ExchangeError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ExchangeError::Unauthorized)?;

    let api_key = header_value
        .strip_prefix(API_KEY_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(ExchangeError::Unauthorized)?;

    let user: Option<(Uuid, Role)> =
        sqlx::query_as("SELECT id, role FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&state.db.pool)
            .await?;

    let (id, role) = user.ok_or(ExchangeError::Unauthorized)?;
    request.extensions_mut().insert(AuthUser { id, role });

    Ok(next.run(request).await)
}

/// Admin-only guard for handlers behind the auth middleware.
pub fn require_admin(user: &AuthUser) -> Result<(), ExchangeError> {
    match user.role {
        Role::Admin => Ok(()),
        Role::User => Err(ExchangeError::Forbidden("admin privileges required")),
    }
}

/// Opaque credential issued at registration.
pub fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_are_opaque_and_fixed_length() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), API_KEY_LEN);
        assert_eq!(b.len(), API_KEY_LEN);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn only_admins_pass_the_admin_guard() {
        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
        };
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&user).is_err());
    }
}
