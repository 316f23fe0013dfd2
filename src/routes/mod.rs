// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP routes.
//!
//! Public: health, auth and the member directory. Everything under
//! `/api/me` goes through [`require_auth`].

pub mod api;
pub mod auth;

use crate::config::BackendKind;
use crate::middleware::{require_auth, security::add_security_headers};
use crate::AppState;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
    pub backend: String,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id: option_env!("BUILD_ID").unwrap_or("unknown").to_string(),
        backend: state.config.backend.to_string(),
    })
}

/// Plain-http dev servers on this machine.
pub fn is_local_origin(origin: &str) -> bool {
    origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1")
}

fn cors_layer(frontend_url: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|o| o == frontend_url || is_local_origin(o))
        }))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    if state.config.backend == BackendKind::Memory {
        tracing::warn!("Memory backend in use; profiles are lost on restart");
    }

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(api::public_routes());

    let member_routes = api::routes(state.config.max_image_bytes)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .layer(middleware::from_fn(add_security_headers))
        .layer(cors_layer(state.config.frontend_url.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
