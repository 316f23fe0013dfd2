// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Editing one's own profile through `PUT /api/me/profile`.

use axum::http::StatusCode;
use base64::Engine;
use community_portfolio::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

mod common;
use common::{body_json, create_test_app, create_test_jwt, get_request, json_request};

/// Register a member directly through the store and return their session token.
async fn signed_in(state: &Arc<AppState>, username: &str) -> String {
    let user = state
        .store
        .register(username, &format!("{username}@example.com"), "secret1")
        .await
        .unwrap();
    create_test_jwt(&user.id, &state.config.jwt_signing_key)
}

async fn put_profile(app: &axum::Router, token: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/me/profile", Some(token), &body))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_update_requires_session() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/me/profile",
            None,
            &json!({ "portfolio": { "tagline": "x" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_partial_patch_keeps_other_fields() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) = put_profile(
        &app,
        &token,
        json!({
            "portfolio": {
                "tagline": "Analytical engines",
                "contact": { "github": "ada" },
                "skills_list": ["Math"]
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let portfolio = &body["portfolio"];
    assert_eq!(portfolio["tagline"], "Analytical engines");
    assert_eq!(portfolio["about_me"], "Hello, I'm ada. I'm new here!");
    // Contact merges, lists replace
    assert_eq!(portfolio["contact"]["github"], "ada");
    assert_eq!(portfolio["contact"]["email"], "ada@example.com");
    assert_eq!(portfolio["skills_list"], json!(["Math"]));

    // Persisted, not just echoed
    let stored = state.store.find_by_username("ada").await.unwrap().unwrap();
    assert_eq!(stored.portfolio.tagline, "Analytical engines");
    assert_eq!(stored.portfolio.contact.github, "ada");
}

#[tokio::test]
async fn test_projects_replace_whole_list() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) = put_profile(
        &app,
        &token,
        json!({
            "portfolio": {
                "projects": [
                    { "title": "Engine", "description": "Notes", "link": "https://example.com", "imageUrl": "" },
                    { "title": "Loom" }
                ]
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let projects = body["portfolio"]["projects"].as_array().unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0]["title"], "Engine");
    assert_eq!(projects[1]["title"], "Loom");
    assert_eq!(projects[1]["description"], "");

    let (_, body) = put_profile(&app, &token, json!({ "portfolio": { "projects": [] } })).await;
    assert_eq!(body["portfolio"]["projects"], json!([]));
}

#[tokio::test]
async fn test_rename_moves_public_profile() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) = put_profile(&app, &token, json!({ "username": "countess" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "countess");

    let old = app
        .clone()
        .oneshot(get_request("/api/members/ada", None))
        .await
        .unwrap();
    assert_eq!(old.status(), StatusCode::NOT_FOUND);

    let new = app
        .clone()
        .oneshot(get_request("/api/members/countess", None))
        .await
        .unwrap();
    assert_eq!(new.status(), StatusCode::OK);

    // The session is keyed by id and survives the rename
    let me = app.oneshot(get_request("/api/me", Some(&token))).await.unwrap();
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(body_json(me).await["username"], "countess");
}

#[tokio::test]
async fn test_rename_to_taken_name_rejects_whole_edit() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;
    signed_in(&state, "grace").await;

    let (status, body) = put_profile(
        &app,
        &token,
        json!({ "username": "GRACE", "portfolio": { "tagline": "changed" } }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let ada = state.store.find_by_username("ada").await.unwrap().unwrap();
    assert_eq!(ada.portfolio.tagline, "AI Enthusiast & Lifelong Learner");
}

#[tokio::test]
async fn test_case_only_rename_allowed() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) = put_profile(&app, &token, json!({ "username": "Ada" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "Ada");
}

#[tokio::test]
async fn test_blank_username_keeps_current_name() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) = put_profile(&app, &token, json!({ "username": "   " })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "ada");
}

#[tokio::test]
async fn test_image_limits() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;
    let max = state.config.max_image_bytes;

    let small = base64::engine::general_purpose::STANDARD.encode([0u8; 64]);
    let (status, body) = put_profile(
        &app,
        &token,
        json!({ "portfolio": { "profile_image_url": format!("data:image/png;base64,{small}") } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["portfolio"]["profile_image_url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));

    let big = base64::engine::general_purpose::STANDARD.encode(vec![0u8; max + 1]);
    let (status, body) = put_profile(
        &app,
        &token,
        json!({ "portfolio": { "profile_image_url": format!("data:image/png;base64,{big}") } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // Oversized project image rejects the edit too
    let (status, _) = put_profile(
        &app,
        &token,
        json!({
            "portfolio": {
                "tagline": "should not stick",
                "projects": [{ "title": "p", "imageUrl": format!("data:image/jpeg;base64,{big}") }]
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ada = state.store.find_by_username("ada").await.unwrap().unwrap();
    assert_ne!(ada.portfolio.tagline, "should not stick");
}

#[tokio::test]
async fn test_clearing_image_restores_placeholder() {
    let (app, state) = create_test_app();
    let token = signed_in(&state, "ada").await;

    let (status, body) =
        put_profile(&app, &token, json!({ "portfolio": { "profile_image_url": "" } })).await;
    assert_eq!(status, StatusCode::OK);

    let id = body["id"].as_str().unwrap();
    assert_eq!(
        body["portfolio"]["profile_image_url"],
        format!("https://i.pravatar.cc/150?u={id}")
    );
}

#[tokio::test]
async fn test_deleted_account_token_is_404() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("no-such-user", &state.config.jwt_signing_key);

    let response = app.oneshot(get_request("/api/me", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
