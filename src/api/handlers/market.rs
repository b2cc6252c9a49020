//! Public market data: the aggregated order book and recent trades.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ExchangeError;
use crate::models::Trade;
use crate::services::book::{self, OrderBook};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<i64>,
}

/// GET /public/orderbook/{ticker}
pub async fn get_orderbook(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Result<Json<OrderBook>, ExchangeError> {
    let view = book::order_book(&state.db.pool, &ticker).await?;
    Ok(Json(view))
}

/// GET /public/transactions/{ticker}?limit=N
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<Trade>>, ExchangeError> {
    let limit = query
        .limit
        .unwrap_or(state.config.trade_history_limit)
        .clamp(1, 100);

    let trades = book::trade_history(&state.db.pool, &ticker, limit).await?;
    Ok(Json(trades))
}
