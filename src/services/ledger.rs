//! Balance ledger primitives.
//!
//! Every operation runs inside the caller's transaction and takes the row
//! lock implicitly through the guarded `UPDATE`. Reservation moves funds out
//! of `available` while leaving `amount` untouched; settlement moves
//! `amount`; admin credit/debit move both columns together. The guards in
//! the `WHERE` clauses keep `0 <= available <= amount` at all times — a
//! guarded update that matches no row aborts the enclosing transaction.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::ExchangeError;

/// The quote asset every instrument trades against.
pub const QUOTE_TICKER: &str = "RUB";

/// Create the balance row if it does not exist yet. Balances are created
/// lazily on first credit; a missing row is a zero balance.
pub async fn ensure_row(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO balances (user_id, ticker, amount, available)
        VALUES ($1, $2, 0, 0)
        ON CONFLICT (user_id, ticker) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .execute(conn)
    .await?;

    Ok(())
}

/// Lock a set of balance rows in canonical `(user_id, ticker)` order,
/// creating missing rows first. Taking the locks in one deterministic order
/// keeps concurrent settlements off each other's toes.
pub async fn lock_rows(
    conn: &mut PgConnection,
    pairs: &[(Uuid, &str)],
) -> Result<(), sqlx::Error> {
    let mut sorted: Vec<(Uuid, &str)> = pairs.to_vec();
    sorted.sort();
    sorted.dedup();

    for (user_id, ticker) in sorted {
        ensure_row(&mut *conn, user_id, ticker).await?;
        sqlx::query("SELECT id FROM balances WHERE user_id = $1 AND ticker = $2 FOR UPDATE")
            .bind(user_id)
            .bind(ticker)
            .fetch_one(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Lock funds behind a live order: `available -= n`, requires
/// `available >= n`.
pub async fn reserve(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    let result = sqlx::query(
        r#"
        UPDATE balances
        SET available = available - $3
        WHERE user_id = $1 AND ticker = $2 AND available >= $3
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .bind(n)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ExchangeError::InsufficientFunds {
            ticker: ticker.to_string(),
        });
    }

    Ok(())
}

/// Free all or part of a reservation: `available += n`, postcondition
/// `available <= amount`. Used on cancellation and when a fill lands at a
/// better price than was reserved for. Reservation accounting guarantees the
/// guard holds for any committed state, so a miss here means the ledger
/// drifted.
pub async fn release(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    let result = sqlx::query(
        r#"
        UPDATE balances
        SET available = available + $3
        WHERE user_id = $1 AND ticker = $2 AND available + $3 <= amount
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .bind(n)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ExchangeError::LedgerDrift("release exceeds holdings"));
    }

    Ok(())
}

/// Deliver previously reserved funds: `amount -= n`. The matching
/// `available` decrement happened at reservation time.
pub async fn settle_debit(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    let result = sqlx::query(
        r#"
        UPDATE balances
        SET amount = amount - $3
        WHERE user_id = $1 AND ticker = $2 AND amount >= $3
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .bind(n)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ExchangeError::InsufficientFunds {
            ticker: ticker.to_string(),
        });
    }

    Ok(())
}

/// Deliver funds that were never reserved: `amount -= n` and
/// `available -= n` together, requires `available >= n`. Used per fill for
/// the quote leg of a market BUY, which skips admission-time reservation.
pub async fn settle_debit_immediate(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    let result = sqlx::query(
        r#"
        UPDATE balances
        SET amount = amount - $3, available = available - $3
        WHERE user_id = $1 AND ticker = $2 AND available >= $3
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .bind(n)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ExchangeError::InsufficientFunds {
            ticker: ticker.to_string(),
        });
    }

    Ok(())
}

/// Credit the receiving side of a fill: `amount += n`, `available += n`.
pub async fn settle_credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    ensure_row(&mut *conn, user_id, ticker).await?;

    sqlx::query(
        r#"
        UPDATE balances
        SET amount = amount + $3, available = available + $3
        WHERE user_id = $1 AND ticker = $2
        "#,
    )
    .bind(user_id)
    .bind(ticker)
    .bind(n)
    .execute(conn)
    .await?;

    Ok(())
}

/// Admin deposit: symmetric credit of both columns.
pub async fn admin_credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    settle_credit(conn, user_id, ticker, n).await
}

/// Admin withdrawal: symmetric debit of both columns; fails when the
/// non-reserved holding cannot cover it.
pub async fn admin_debit(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
    n: i64,
) -> Result<(), ExchangeError> {
    settle_debit_immediate(conn, user_id, ticker, n).await
}

/// Current `available` for a (user, ticker); missing row reads as zero.
pub async fn available_of(
    conn: &mut PgConnection,
    user_id: Uuid,
    ticker: &str,
) -> Result<i64, sqlx::Error> {
    let available: Option<i64> =
        sqlx::query_scalar("SELECT available FROM balances WHERE user_id = $1 AND ticker = $2")
            .bind(user_id)
            .bind(ticker)
            .fetch_optional(conn)
            .await?;

    Ok(available.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn reserve_fails_without_funds(pool: PgPool) {
        let user = testing::register_user(&pool, "alice").await;

        let mut tx = pool.begin().await.unwrap();
        let err = reserve(&mut tx, user, QUOTE_TICKER, 100).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));
    }

    #[sqlx::test]
    async fn reserve_and_release_round_trip(pool: PgPool) {
        let user = testing::register_user(&pool, "alice").await;
        testing::deposit(&pool, user, QUOTE_TICKER, 1000).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, user, QUOTE_TICKER, 400).await.unwrap();
        release(&mut tx, user, QUOTE_TICKER, 400).await.unwrap();
        tx.commit().await.unwrap();

        let (amount, available) = testing::balance_of(&pool, user, QUOTE_TICKER).await;
        assert_eq!((amount, available), (1000, 1000));
    }

    #[sqlx::test]
    async fn release_cannot_exceed_amount(pool: PgPool) {
        let user = testing::register_user(&pool, "alice").await;
        testing::deposit(&pool, user, QUOTE_TICKER, 100).await;

        let mut tx = pool.begin().await.unwrap();
        let err = release(&mut tx, user, QUOTE_TICKER, 1).await.unwrap_err();
        assert!(matches!(err, ExchangeError::LedgerDrift(_)));
    }

    #[sqlx::test]
    async fn admin_debit_respects_reservations(pool: PgPool) {
        let user = testing::register_user(&pool, "alice").await;
        testing::deposit(&pool, user, QUOTE_TICKER, 500).await;

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, user, QUOTE_TICKER, 300).await.unwrap();
        // 200 still available; withdrawing more must fail.
        let err = admin_debit(&mut tx, user, QUOTE_TICKER, 201).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InsufficientFunds { .. }));
        drop(tx);

        let mut tx = pool.begin().await.unwrap();
        reserve(&mut tx, user, QUOTE_TICKER, 300).await.unwrap();
        admin_debit(&mut tx, user, QUOTE_TICKER, 200).await.unwrap();
        tx.commit().await.unwrap();

        let (amount, available) = testing::balance_of(&pool, user, QUOTE_TICKER).await;
        assert_eq!((amount, available), (300, 0));
    }

    #[sqlx::test]
    async fn missing_row_reads_as_zero(pool: PgPool) {
        let user = testing::register_user(&pool, "alice").await;

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(available_of(&mut conn, user, "MEMO").await.unwrap(), 0);
    }
}
