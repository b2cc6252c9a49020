//! Instrument registry endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{self, AuthUser};
use crate::error::ExchangeError;
use crate::models::{CreateInstrumentRequest, Instrument, InstrumentResponse, OkResponse};
use crate::services::ledger::QUOTE_TICKER;
use crate::AppState;

/// GET /public/instrument
pub async fn list_instruments(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<InstrumentResponse>>, ExchangeError> {
    let instruments = sqlx::query_as::<_, InstrumentResponse>(
        "SELECT name, ticker FROM instruments ORDER BY ticker",
    )
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(instruments))
}

/// POST /admin/instrument
pub async fn create_instrument(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateInstrumentRequest>,
) -> Result<Json<OkResponse>, ExchangeError> {
    auth::require_admin(&auth_user)?;
    req.validate()
        .map_err(|e| ExchangeError::Validation(e.to_string()))?;

    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM instruments WHERE ticker = $1")
        .bind(&req.ticker)
        .fetch_optional(&state.db.pool)
        .await?;
    if exists.is_some() {
        return Err(ExchangeError::InstrumentExists(req.ticker));
    }

    sqlx::query("INSERT INTO instruments (name, ticker) VALUES ($1, $2)")
        .bind(&req.name)
        .bind(&req.ticker)
        .execute(&state.db.pool)
        .await?;

    tracing::info!(ticker = %req.ticker, admin = %auth_user.id, "instrument created");

    Ok(Json(OkResponse::new()))
}

/// DELETE /admin/instrument/{ticker}
pub async fn delete_instrument(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(ticker): Path<String>,
) -> Result<Json<OkResponse>, ExchangeError> {
    auth::require_admin(&auth_user)?;

    if ticker == QUOTE_TICKER {
        return Err(ExchangeError::Validation(
            "the quote asset cannot be removed".into(),
        ));
    }

    let deleted: Option<Instrument> = sqlx::query_as(
        "DELETE FROM instruments WHERE ticker = $1 RETURNING id, name, ticker",
    )
    .bind(&ticker)
    .fetch_optional(&state.db.pool)
    .await?;

    let Some(instrument) = deleted else {
        return Err(ExchangeError::UnknownInstrument(ticker));
    };

    tracing::info!(%ticker, name = %instrument.name, admin = %auth_user.id, "instrument deleted");

    Ok(Json(OkResponse::new()))
}
