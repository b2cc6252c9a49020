use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

/// Error taxonomy shared by the ledger, the matching engine and the HTTP
/// adapters. The HTTP layer maps each kind to a status code; nothing inside a
/// matching transaction recovers from these, so any of them aborts the whole
/// transaction.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("{0}")]
    Validation(String),

    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("instrument not found: {0}")]
    UnknownInstrument(String),

    #[error("instrument already exists: {0}")]
    InstrumentExists(String),

    #[error("user not found: {0}")]
    UnknownUser(Uuid),

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("insufficient {ticker} balance")]
    InsufficientFunds { ticker: String },

    #[error("not enough liquidity to fill the market order")]
    InsufficientLiquidity,

    #[error("order cannot be cancelled")]
    NotCancellable,

    /// Lock timeout, serialization failure or deadlock that survived the
    /// bounded retry loop. Safe for the caller to retry.
    #[error("transient store failure, retry the request")]
    Transient(#[source] sqlx::Error),

    #[error("ledger invariant violated: {0}")]
    LedgerDrift(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl ExchangeError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExchangeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExchangeError::Unauthorized => StatusCode::UNAUTHORIZED,
            ExchangeError::Forbidden(_) => StatusCode::FORBIDDEN,
            ExchangeError::UnknownInstrument(_)
            | ExchangeError::InstrumentExists(_)
            | ExchangeError::UnknownUser(_)
            | ExchangeError::InsufficientFunds { .. }
            | ExchangeError::InsufficientLiquidity
            | ExchangeError::NotCancellable => StatusCode::BAD_REQUEST,
            ExchangeError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            ExchangeError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExchangeError::LedgerDrift(_) | ExchangeError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::Validation(_) => "VALIDATION_ERROR",
            ExchangeError::Unauthorized => "UNAUTHORIZED",
            ExchangeError::Forbidden(_) => "FORBIDDEN",
            ExchangeError::UnknownInstrument(_) => "UNKNOWN_INSTRUMENT",
            ExchangeError::InstrumentExists(_) => "INSTRUMENT_EXISTS",
            ExchangeError::UnknownUser(_) => "UNKNOWN_USER",
            ExchangeError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            ExchangeError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ExchangeError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            ExchangeError::NotCancellable => "NOT_CANCELLABLE",
            ExchangeError::Transient(_) => "TRANSIENT_STORE_ERROR",
            ExchangeError::LedgerDrift(_) => "LEDGER_DRIFT",
            ExchangeError::Database(_) => "INTERNAL_ERROR",
        }
    }
}

/// Whether a store error is worth retrying: serialization failure (40001) or
/// deadlock detected (40P01).
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self:?}");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ExchangeError::Validation("qty".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ExchangeError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ExchangeError::Forbidden("admin only").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ExchangeError::UnknownInstrument("MEMO".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExchangeError::OrderNotFound(Uuid::nil()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ExchangeError::InsufficientLiquidity.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExchangeError::Transient(sqlx::Error::PoolTimedOut).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn pool_timeout_is_transient() {
        assert!(is_transient(&sqlx::Error::PoolTimedOut));
        assert!(!is_transient(&sqlx::Error::RowNotFound));
    }
}
