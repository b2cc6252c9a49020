use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An executed fill. Append-only; buyer/seller become NULL if the user row
/// is ever deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub ticker: String,
    pub buyer_id: Option<Uuid>,
    pub seller_id: Option<Uuid>,
    pub amount: i64,
    pub price: i64,
    pub timestamp: DateTime<Utc>,
}
