//! Onboarding API Server - Backend for HR onboarding packets
//!
//! Provides REST endpoints for:
//! - Employee uploads of signed onboarding PDFs
//! - Saving and resuming in-progress forms
//! - Staff retrieval of the assembled, flattened packet

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod config;
mod error;
mod handlers;
mod jwt;
mod models;
mod state;
mod store;

#[cfg(test)]
mod tests;

use config::Config;
use state::AppState;

fn app(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Staff review
        .route("/api/admin/user-pdf", get(handlers::get_user_pdf))
        // Employee uploads
        .route("/api/onboarding/pdf", post(handlers::save_pdf))
        .route(
            "/api/onboarding/progress",
            get(handlers::get_progress).post(handlers::save_progress),
        )
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("onboard_api=info".parse()?)
                .add_directive("onboard_pdf=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = Config::from_env()?;

    // Initialize application state
    info!("Initializing onboarding API...");
    let state = Arc::new(AppState::new(&config).await?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting onboarding API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
