// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Directory and profile API routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ProfileUpdate, User};
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Room for a profile image plus several project images, base64-encoded.
const IMAGES_PER_EDIT: usize = 8;

/// Public directory routes.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/members", get(list_members))
        .route("/api/members/{username}", get(get_member))
}

/// Routes for the signed-in user.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes(max_image_bytes: usize) -> Router<Arc<AppState>> {
    // base64 inflates by 4/3
    let body_limit = max_image_bytes
        .saturating_mul(IMAGES_PER_EDIT)
        .saturating_mul(4)
        / 3
        + 64 * 1024;

    Router::new()
        .route("/api/me", get(get_me))
        .route(
            "/api/me/profile",
            axum::routing::put(update_profile).layer(DefaultBodyLimit::max(body_limit)),
        )
}

// ─── Directory ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MembersResponse {
    pub members: Vec<User>,
    pub total: u32,
}

/// List every community member.
async fn list_members(State(state): State<Arc<AppState>>) -> Result<Json<MembersResponse>> {
    let members = state.store.list().await?;
    tracing::debug!(count = members.len(), "Listing members");

    Ok(Json(MembersResponse {
        total: members.len() as u32,
        members,
    }))
}

/// View one member's profile by username (case-insensitive).
async fn get_member(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<User>> {
    state
        .store
        .find_by_username(&username)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
}

// ─── Current User ────────────────────────────────────────────

/// Restore the session's user. 404 means the account no longer exists
/// and the client should drop its session.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(state.store.find_by_id(&user.user_id).await?))
}

/// Edit the signed-in user's own profile.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    let current = state.store.find_by_id(&auth.user_id).await?;

    tracing::debug!(
        user_id = %auth.user_id,
        rename = update.username.is_some(),
        patch = update.portfolio.is_some(),
        "Updating profile"
    );

    let updated = state
        .store
        .update_profile(&current.username, update.username.as_deref(), update.portfolio)
        .await?;

    Ok(Json(updated))
}
