use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::error::ExchangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_direction", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyExecuted,
    Executed,
    Cancelled,
}

impl OrderStatus {
    /// Live orders rest on the book and may still fill.
    pub fn is_live(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyExecuted)
    }
}

/// A persisted order. `price` is NULL for market orders, which never rest
/// on the book. The row also carries a `seq` column stamped at insertion,
/// which breaks timestamp ties for time priority.
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub qty: i64,
    pub price: Option<i64>,
    pub filled: i64,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn remaining(&self) -> i64 {
        self.qty - self.filled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderBody {
    pub direction: Direction,
    pub ticker: String,
    pub qty: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrderBody {
    pub direction: Direction,
    pub ticker: String,
    pub qty: i64,
}

/// Order submission body. A present `price` makes it a limit order; the
/// variants are tried in that sequence, so a body without a price (or with a
/// null one) deserializes as a market order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreateOrderRequest {
    Limit(LimitOrderBody),
    Market(MarketOrderBody),
}

impl CreateOrderRequest {
    pub fn direction(&self) -> Direction {
        match self {
            CreateOrderRequest::Limit(body) => body.direction,
            CreateOrderRequest::Market(body) => body.direction,
        }
    }

    pub fn ticker(&self) -> &str {
        match self {
            CreateOrderRequest::Limit(body) => &body.ticker,
            CreateOrderRequest::Market(body) => &body.ticker,
        }
    }

    pub fn qty(&self) -> i64 {
        match self {
            CreateOrderRequest::Limit(body) => body.qty,
            CreateOrderRequest::Market(body) => body.qty,
        }
    }

    pub fn price(&self) -> Option<i64> {
        match self {
            CreateOrderRequest::Limit(body) => Some(body.price),
            CreateOrderRequest::Market(_) => None,
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, CreateOrderRequest::Market(_))
    }

    pub fn validate(&self) -> Result<(), ExchangeError> {
        if self.qty() < 1 {
            return Err(ExchangeError::Validation(
                "qty must be at least 1".into(),
            ));
        }
        if let Some(price) = self.price() {
            if price <= 0 {
                return Err(ExchangeError::Validation(
                    "price must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Public order representation: the limit/market split mirrors the request
/// variants, with lifecycle fields alongside.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OrderResponse {
    Limit {
        id: Uuid,
        user_id: Uuid,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
        filled: i64,
        body: LimitOrderBody,
    },
    Market {
        id: Uuid,
        user_id: Uuid,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
        body: MarketOrderBody,
    },
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        match order.price {
            Some(price) => OrderResponse::Limit {
                id: order.id,
                user_id: order.user_id,
                status: order.status,
                timestamp: order.timestamp,
                filled: order.filled,
                body: LimitOrderBody {
                    direction: order.direction,
                    ticker: order.ticker,
                    qty: order.qty,
                    price,
                },
            },
            None => OrderResponse::Market {
                id: order.id,
                user_id: order.user_id,
                status: order.status,
                timestamp: order.timestamp,
                body: MarketOrderBody {
                    direction: order.direction,
                    ticker: order.ticker,
                    qty: order.qty,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub filled_qty: i64,
    pub status: OrderStatus,
}
