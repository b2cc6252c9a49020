//! Order submission, lookup and cancellation.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ExchangeError;
use crate::models::{CreateOrderRequest, CreateOrderResponse, OkResponse, Order, OrderResponse};
use crate::AppState;

/// POST /order
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ExchangeError> {
    req.validate()?;

    let outcome = state.engine.submit(auth_user.id, &req).await?;

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id: outcome.order_id,
        filled_qty: outcome.filled_qty,
        status: outcome.status,
    }))
}

/// GET /order
///
/// All of the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Vec<OrderResponse>>, ExchangeError> {
    let orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY timestamp DESC, seq DESC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /order/{order_id}
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(_auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ExchangeError> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&state.db.pool)
        .await?;

    let order = order.ok_or(ExchangeError::OrderNotFound(order_id))?;

    Ok(Json(order.into()))
}

/// DELETE /order/{order_id}
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OkResponse>, ExchangeError> {
    state.engine.cancel(auth_user.id, order_id).await?;

    Ok(Json(OkResponse::new()))
}
