use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::services::matching::MatchingEngine;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub engine: MatchingEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exchange_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("Starting exchange backend v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database and apply migrations
    let db = Database::connect(&config.database_url, config.max_connections).await?;
    db.migrate().await?;
    tracing::info!("Database connected, schema up to date");

    // The matching engine works directly against the store; the pool is its
    // only state.
    let engine = MatchingEngine::new(db.pool.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        engine,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
