use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::auth::auth_middleware;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/public/register", post(handlers::user::register))
        .route("/public/instrument", get(handlers::instrument::list_instruments))
        .route("/public/orderbook/:ticker", get(handlers::market::get_orderbook))
        .route("/public/transactions/:ticker", get(handlers::market::get_transactions));

    // Protected routes (API key required; admin routes check the role)
    let protected_routes = Router::new()
        .route("/balance", get(handlers::balance::get_balances))
        .route("/order", post(handlers::order::create_order))
        .route("/order", get(handlers::order::list_orders))
        .route("/order/:order_id", get(handlers::order::get_order))
        .route("/order/:order_id", delete(handlers::order::cancel_order))
        .route("/admin/instrument", post(handlers::instrument::create_instrument))
        .route(
            "/admin/instrument/:ticker",
            delete(handlers::instrument::delete_instrument),
        )
        .route("/admin/user/:user_id", delete(handlers::user::delete_user))
        .route("/admin/balance/deposit", post(handlers::balance::deposit))
        .route("/admin/balance/withdraw", post(handlers::balance::withdraw))
        .layer(axum_middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
