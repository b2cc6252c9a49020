//! Balance queries and the admin deposit/withdraw path. The admin path goes
//! through the same ledger primitives as matching, so the balance invariants
//! stay global.

use axum::{extract::State, Extension, Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

use crate::auth::{self, AuthUser};
use crate::error::ExchangeError;
use crate::models::{Balance, BalanceChangeRequest, OkResponse};
use crate::services::ledger;
use crate::AppState;

/// GET /balance
///
/// The caller's total holdings as a `{ticker: amount}` map.
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<BTreeMap<String, i64>>, ExchangeError> {
    let balances: Vec<Balance> = sqlx::query_as("SELECT * FROM balances WHERE user_id = $1")
        .bind(auth_user.id)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(
        balances
            .into_iter()
            .map(|balance| (balance.ticker, balance.amount))
            .collect(),
    ))
}

/// POST /admin/balance/deposit
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<BalanceChangeRequest>,
) -> Result<Json<OkResponse>, ExchangeError> {
    auth::require_admin(&auth_user)?;
    req.validate()
        .map_err(|e| ExchangeError::Validation(e.to_string()))?;

    let mut tx = state.db.pool.begin().await?;
    check_target(&mut tx, &req).await?;
    ledger::admin_credit(&mut tx, req.user_id, &req.ticker, req.amount).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %req.user_id,
        ticker = %req.ticker,
        amount = req.amount,
        admin = %auth_user.id,
        "balance deposited"
    );

    Ok(Json(OkResponse::new()))
}

/// POST /admin/balance/withdraw
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<BalanceChangeRequest>,
) -> Result<Json<OkResponse>, ExchangeError> {
    auth::require_admin(&auth_user)?;
    req.validate()
        .map_err(|e| ExchangeError::Validation(e.to_string()))?;

    let mut tx = state.db.pool.begin().await?;
    check_target(&mut tx, &req).await?;
    ledger::admin_debit(&mut tx, req.user_id, &req.ticker, req.amount).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %req.user_id,
        ticker = %req.ticker,
        amount = req.amount,
        admin = %auth_user.id,
        "balance withdrawn"
    );

    Ok(Json(OkResponse::new()))
}

async fn check_target(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    req: &BalanceChangeRequest,
) -> Result<(), ExchangeError> {
    let user_exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = $1")
        .bind(req.user_id)
        .fetch_optional(&mut **tx)
        .await?;
    if user_exists.is_none() {
        return Err(ExchangeError::UnknownUser(req.user_id));
    }

    let instrument_exists: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM instruments WHERE ticker = $1")
            .bind(&req.ticker)
            .fetch_optional(&mut **tx)
            .await?;
    if instrument_exists.is_none() {
        return Err(ExchangeError::UnknownInstrument(req.ticker.clone()));
    }

    Ok(())
}
