use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{is_transient, ExchangeError};
use crate::models::{CreateOrderRequest, Direction, Order, OrderStatus};
use crate::services::ledger::{self, QUOTE_TICKER};

/// Attempts per operation before a serialization failure or deadlock is
/// surfaced to the caller.
const MAX_TRANSIENT_RETRIES: u32 = 3;

/// Result of an accepted order submission.
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub order_id: Uuid,
    pub filled_qty: i64,
    pub status: OrderStatus,
}

/// A resting order eligible to match, read under `FOR UPDATE`.
#[derive(Debug, sqlx::FromRow)]
struct CandidateRow {
    id: Uuid,
    user_id: Uuid,
    qty: i64,
    price: i64,
    filled: i64,
}

fn notional(qty: i64, price: i64) -> Result<i64, ExchangeError> {
    qty.checked_mul(price)
        .ok_or_else(|| ExchangeError::Validation("order notional overflows".into()))
}

pub struct MatchingEngine {
    pool: PgPool,
}

impl MatchingEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Admit and match a new order. The whole operation is one transaction;
    /// serialization failures and deadlocks are retried a bounded number of
    /// times before surfacing as transient.
    pub async fn submit(
        &self,
        user_id: Uuid,
        request: &CreateOrderRequest,
    ) -> Result<SubmitOutcome, ExchangeError> {
        let mut attempt = 0;
        loop {
            match self.try_submit(user_id, request).await {
                Err(ExchangeError::Database(err)) if is_transient(&err) => {
                    attempt += 1;
                    if attempt > MAX_TRANSIENT_RETRIES {
                        return Err(ExchangeError::Transient(err));
                    }
                    warn!(attempt, "retrying order submission after transient store error");
                }
                other => return other,
            }
        }
    }

    /// Cancel a live limit order, releasing its outstanding reservation.
    pub async fn cancel(&self, user_id: Uuid, order_id: Uuid) -> Result<(), ExchangeError> {
        let mut attempt = 0;
        loop {
            match self.try_cancel(user_id, order_id).await {
                Err(ExchangeError::Database(err)) if is_transient(&err) => {
                    attempt += 1;
                    if attempt > MAX_TRANSIENT_RETRIES {
                        return Err(ExchangeError::Transient(err));
                    }
                    warn!(attempt, %order_id, "retrying cancellation after transient store error");
                }
                other => return other,
            }
        }
    }

    async fn try_submit(
        &self,
        user_id: Uuid,
        request: &CreateOrderRequest,
    ) -> Result<SubmitOutcome, ExchangeError> {
        let direction = request.direction();
        let ticker = request.ticker();
        let qty = request.qty();
        let price = request.price();

        let mut tx = self.pool.begin().await?;

        let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM instruments WHERE ticker = $1")
            .bind(ticker)
            .fetch_optional(&mut *tx)
            .await?;
        if known.is_none() {
            return Err(ExchangeError::UnknownInstrument(ticker.to_string()));
        }

        // Funds reservation. A market BUY reserves nothing; its quote leg is
        // charged per fill after an admission-time affordability check.
        match (direction, price) {
            (Direction::Buy, Some(limit_price)) => {
                ledger::reserve(&mut tx, user_id, QUOTE_TICKER, notional(qty, limit_price)?)
                    .await?
            }
            (Direction::Sell, _) => ledger::reserve(&mut tx, user_id, ticker, qty).await?,
            (Direction::Buy, None) => {}
        }

        if price.is_none() {
            self.check_market_admission(&mut tx, user_id, direction, ticker, qty)
                .await?;
        }

        let order_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, ticker, direction, qty, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(ticker)
        .bind(direction)
        .bind(qty)
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;

        let candidates = self
            .lock_candidates(&mut tx, direction, ticker, price)
            .await?;

        let mut filled_total: i64 = 0;
        for maker in &candidates {
            if filled_total >= qty {
                break;
            }

            let take = (qty - filled_total).min(maker.qty - maker.filled);
            if take == 0 {
                continue;
            }

            // Self-trade: no settlement, no trade record, no fill progress
            // on either side.
            if maker.user_id == user_id {
                debug!(%order_id, maker_order = %maker.id, "skipping self-match");
                continue;
            }

            let (buyer, seller) = match direction {
                Direction::Buy => (user_id, maker.user_id),
                Direction::Sell => (maker.user_id, user_id),
            };

            self.settle_fill(&mut tx, buyer, seller, ticker, take, maker.price, direction, price)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO trades (ticker, buyer_id, seller_id, amount, price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(ticker)
            .bind(buyer)
            .bind(seller)
            .bind(take)
            .bind(maker.price)
            .execute(&mut *tx)
            .await?;

            let maker_filled = maker.filled + take;
            let maker_status = if maker_filled == maker.qty {
                OrderStatus::Executed
            } else {
                OrderStatus::PartiallyExecuted
            };
            sqlx::query("UPDATE orders SET filled = $2, status = $3 WHERE id = $1")
                .bind(maker.id)
                .bind(maker_filled)
                .bind(maker_status)
                .execute(&mut *tx)
                .await?;

            filled_total += take;
            debug!(%order_id, maker_order = %maker.id, take, price = maker.price, "fill");
        }

        let status = if filled_total == qty {
            OrderStatus::Executed
        } else if price.is_none() {
            // Admission saw enough liquidity, but a concurrent taker got to
            // it first; a market order may not rest.
            return Err(ExchangeError::InsufficientLiquidity);
        } else if filled_total > 0 {
            OrderStatus::PartiallyExecuted
        } else {
            OrderStatus::New
        };

        if filled_total > 0 {
            sqlx::query("UPDATE orders SET filled = $2, status = $3 WHERE id = $1")
                .bind(order_id)
                .bind(filled_total)
                .bind(status)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(%order_id, %direction, ticker, qty, ?price, filled = filled_total, ?status, "order admitted");

        Ok(SubmitOutcome {
            order_id,
            filled_qty: filled_total,
            status,
        })
    }

    /// Market-order admission checks: the opposite side must carry enough
    /// non-self liquidity, and a market BUY must be able to afford the
    /// cheapest covering prefix out of its current quote `available`.
    async fn check_market_admission(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        direction: Direction,
        ticker: &str,
        qty: i64,
    ) -> Result<(), ExchangeError> {
        match direction {
            Direction::Buy => {
                let resting: Vec<(i64, i64)> = sqlx::query_as(
                    r#"
                    SELECT price, qty - filled
                    FROM orders
                    WHERE ticker = $1
                      AND direction = 'SELL'
                      AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                      AND price IS NOT NULL
                      AND user_id <> $2
                    ORDER BY price ASC, timestamp ASC, seq ASC
                    "#,
                )
                .bind(ticker)
                .bind(user_id)
                .fetch_all(&mut **tx)
                .await?;

                let mut need = qty;
                let mut cost: i64 = 0;
                for (price, remaining) in resting {
                    if need == 0 {
                        break;
                    }
                    let take = need.min(remaining);
                    cost = cost
                        .checked_add(notional(take, price)?)
                        .ok_or_else(|| {
                            ExchangeError::Validation("order notional overflows".into())
                        })?;
                    need -= take;
                }

                if need > 0 {
                    return Err(ExchangeError::InsufficientLiquidity);
                }

                let available = ledger::available_of(&mut *tx, user_id, QUOTE_TICKER).await?;
                if cost > available {
                    return Err(ExchangeError::InsufficientFunds {
                        ticker: QUOTE_TICKER.to_string(),
                    });
                }
            }
            Direction::Sell => {
                let liquidity: i64 = sqlx::query_scalar(
                    r#"
                    SELECT COALESCE(SUM(qty - filled), 0)::BIGINT
                    FROM orders
                    WHERE ticker = $1
                      AND direction = 'BUY'
                      AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                      AND price IS NOT NULL
                      AND user_id <> $2
                    "#,
                )
                .bind(ticker)
                .bind(user_id)
                .fetch_one(&mut **tx)
                .await?;

                if liquidity < qty {
                    return Err(ExchangeError::InsufficientLiquidity);
                }
            }
        }

        Ok(())
    }

    /// Read and lock the matching candidates in price-time priority: best
    /// price first, then admission time, then insertion order.
    async fn lock_candidates(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        direction: Direction,
        ticker: &str,
        limit_price: Option<i64>,
    ) -> Result<Vec<CandidateRow>, ExchangeError> {
        let (comparison, ordering) = match direction {
            Direction::Buy => ("<=", "ASC"),
            Direction::Sell => (">=", "DESC"),
        };

        let price_filter = if limit_price.is_some() {
            format!("AND price {comparison} $3")
        } else {
            String::new()
        };

        let sql = format!(
            r#"
            SELECT id, user_id, qty, price, filled
            FROM orders
            WHERE ticker = $1
              AND direction = $2
              AND status IN ('NEW', 'PARTIALLY_EXECUTED')
              AND price IS NOT NULL
              {price_filter}
            ORDER BY price {ordering}, timestamp ASC, seq ASC
            FOR UPDATE
            "#,
        );

        let mut query = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(ticker)
            .bind(direction.opposite());
        if let Some(price) = limit_price {
            query = query.bind(price);
        }

        Ok(query.fetch_all(&mut **tx).await?)
    }

    /// Settle one fill of `take` units at the maker's price: four balance
    /// rows locked in canonical `(user_id, ticker)` order, then the quote
    /// and base legs moved between buyer and seller.
    #[allow(clippy::too_many_arguments)]
    async fn settle_fill(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        buyer: Uuid,
        seller: Uuid,
        ticker: &str,
        take: i64,
        fill_price: i64,
        taker_direction: Direction,
        taker_limit_price: Option<i64>,
    ) -> Result<(), ExchangeError> {
        let cost = notional(take, fill_price)?;

        ledger::lock_rows(
            &mut *tx,
            &[
                (buyer, QUOTE_TICKER),
                (buyer, ticker),
                (seller, QUOTE_TICKER),
                (seller, ticker),
            ],
        )
        .await?;

        match (taker_direction, taker_limit_price) {
            // Market BUY: nothing was reserved, so the quote leg is charged
            // against `available` here, per fill.
            (Direction::Buy, None) => {
                ledger::settle_debit_immediate(&mut *tx, buyer, QUOTE_TICKER, cost).await?
            }
            // Limit BUY taker: reserved at its own limit price; deliver the
            // cost and hand back the improvement over the maker's price.
            (Direction::Buy, Some(limit_price)) => {
                ledger::settle_debit(&mut *tx, buyer, QUOTE_TICKER, cost).await?;
                let refund = notional(take, limit_price)? - cost;
                if refund > 0 {
                    ledger::release(&mut *tx, buyer, QUOTE_TICKER, refund).await?;
                }
            }
            // SELL taker: the buyer is the maker, reserved at exactly the
            // fill price.
            (Direction::Sell, _) => {
                ledger::settle_debit(&mut *tx, buyer, QUOTE_TICKER, cost).await?
            }
        }

        ledger::settle_credit(&mut *tx, seller, QUOTE_TICKER, cost).await?;
        ledger::settle_debit(&mut *tx, seller, ticker, take).await?;
        ledger::settle_credit(&mut *tx, buyer, ticker, take).await?;

        Ok(())
    }

    async fn try_cancel(&self, user_id: Uuid, order_id: Uuid) -> Result<(), ExchangeError> {
        let mut tx = self.pool.begin().await?;

        let order: Option<Order> =
            sqlx::query_as("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
        let order = order.ok_or(ExchangeError::OrderNotFound(order_id))?;

        if order.user_id != user_id {
            return Err(ExchangeError::Forbidden(
                "orders can only be cancelled by their owner",
            ));
        }
        if !order.status.is_live() {
            return Err(ExchangeError::NotCancellable);
        }
        let Some(price) = order.price else {
            // Market orders never reach a live resting state.
            return Err(ExchangeError::NotCancellable);
        };

        let outstanding = order.remaining();
        match order.direction {
            Direction::Buy => {
                ledger::release(
                    &mut tx,
                    user_id,
                    QUOTE_TICKER,
                    notional(outstanding, price)?,
                )
                .await?
            }
            Direction::Sell => ledger::release(&mut tx, user_id, &order.ticker, outstanding).await?,
        }

        sqlx::query("UPDATE orders SET status = 'CANCELLED' WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(%order_id, "order cancelled");
        Ok(())
    }
}
