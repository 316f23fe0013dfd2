// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and logout.
//!
//! A successful register or login returns the user plus a session token,
//! and sets the same token as an HttpOnly cookie.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::User;
use crate::AppState;

use super::is_local_origin;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegisterRequest {
    #[validate(length(max = 50))]
    pub username: String,
    #[validate(length(max = 254))]
    pub email: String,
    /// Upper bound keeps hashing cost bounded
    #[validate(length(max = 256))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginRequest {
    #[validate(length(max = 254))]
    pub email: String,
    #[validate(length(max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub user: User,
    pub token: String,
}

fn check_request(req: &impl Validate) -> Result<()> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Local development frontends get cookies without `Secure`.
fn session_cookie(token: String, frontend_url: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local_origin(frontend_url))
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let token = create_jwt(&user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let jar = jar.add(session_cookie(token.clone(), &state.config.frontend_url));
    Ok((jar, Json(SessionResponse { user, token })))
}

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>)> {
    check_request(&req)?;

    let user = state
        .store
        .register(&req.username, &req.email, &req.password)
        .await?;

    let (jar, body) = start_session(&state, jar, user)?;
    Ok((StatusCode::CREATED, jar, body))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    check_request(&req)?;

    let user = state.store.authenticate(&req.email, &req.password).await?;
    start_session(&state, jar, user)
}

/// Clear the session cookie. Tokens are stateless, so there is nothing
/// to revoke server-side.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let removal = Cookie::build(SESSION_COOKIE)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local_origin(&state.config.frontend_url));

    (StatusCode::NO_CONTENT, jar.remove(removal))
}
