// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Community Portfolio API Server
//!
//! Serves the member directory and profile editing API for the community
//! site, over whichever persistence backend is configured.

use community_portfolio::{config::Config, db, services::ProfileStore, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = %config.backend,
        "Starting Community Portfolio API"
    );

    let backend = db::connect(&config).await?;
    let store = ProfileStore::from_config(backend, &config);
    tracing::info!(
        min_password_length = config.min_password_length,
        max_image_bytes = config.max_image_bytes,
        "Profile store initialized"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
    });

    let app = community_portfolio::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("community_portfolio=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
