use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Per-(user, ticker) holding. `available` is the part not reserved behind
/// live orders; a missing row is equivalent to a zero balance.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub amount: i64,
    pub available: i64,
}

/// Body of the admin deposit/withdraw endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct BalanceChangeRequest {
    pub user_id: Uuid,
    pub ticker: String,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
}
