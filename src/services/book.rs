//! Read-only market views: the aggregated order book and the recent-trade
//! feed. Both are plain queries over committed state.

use serde::Serialize;
use sqlx::PgPool;

use crate::error::ExchangeError;
use crate::models::Trade;

#[derive(Debug, Serialize)]
pub struct BookLevel {
    pub price: i64,
    pub qty: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderBook {
    pub bid_levels: Vec<BookLevel>,
    pub ask_levels: Vec<BookLevel>,
}

/// Aggregate the live resting limit orders of one ticker by price level.
/// Bids come back best-first (descending), asks ascending; exhausted levels
/// are dropped. Market orders never appear here.
pub async fn order_book(pool: &PgPool, ticker: &str) -> Result<OrderBook, ExchangeError> {
    let bid_levels = levels(pool, ticker, "BUY", "DESC").await?;
    let ask_levels = levels(pool, ticker, "SELL", "ASC").await?;

    Ok(OrderBook {
        bid_levels,
        ask_levels,
    })
}

async fn levels(
    pool: &PgPool,
    ticker: &str,
    direction: &str,
    ordering: &str,
) -> Result<Vec<BookLevel>, ExchangeError> {
    let sql = format!(
        r#"
        SELECT price, SUM(qty - filled)::BIGINT AS qty
        FROM orders
        WHERE ticker = $1
          AND direction = '{direction}'
          AND status IN ('NEW', 'PARTIALLY_EXECUTED')
          AND price IS NOT NULL
        GROUP BY price
        HAVING SUM(qty - filled) > 0
        ORDER BY price {ordering}
        "#,
    );

    let rows: Vec<(i64, i64)> = sqlx::query_as(&sql).bind(ticker).fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|(price, qty)| BookLevel { price, qty })
        .collect())
}

/// The most recent trades of a ticker, newest first.
pub async fn trade_history(
    pool: &PgPool,
    ticker: &str,
    limit: i64,
) -> Result<Vec<Trade>, ExchangeError> {
    let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM instruments WHERE ticker = $1")
        .bind(ticker)
        .fetch_optional(pool)
        .await?;
    if known.is_none() {
        return Err(ExchangeError::UnknownInstrument(ticker.to_string()));
    }

    let trades = sqlx::query_as::<_, Trade>(
        r#"
        SELECT id, ticker, buyer_id, seller_id, amount, price, timestamp
        FROM trades
        WHERE ticker = $1
        ORDER BY timestamp DESC
        LIMIT $2
        "#,
    )
    .bind(ticker)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(trades)
}
