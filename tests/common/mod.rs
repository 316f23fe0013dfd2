// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use community_portfolio::config::Config;
use community_portfolio::db::{FirestoreDb, MemoryDb, ProfileBackend};
use community_portfolio::routes::create_router;
use community_portfolio::services::ProfileStore;
use community_portfolio::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Plain client for writing documents in layouts this crate no longer
/// produces.
#[allow(dead_code)]
pub async fn raw_firestore_client() -> firestore::FirestoreDb {
    let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
        Ok(gcloud_sdk::Token {
            token_type: "Bearer".to_string(),
            token: gcloud_sdk::SecretValue::new(
                "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                    .to_string()
                    .into(),
            ),
            expiry: chrono::Utc::now() + chrono::Duration::hours(1),
        })
    });

    firestore::FirestoreDb::with_options_token_source(
        firestore::FirestoreDbOptions::new("test-project".to_string()),
        gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
        gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
    )
    .await
    .expect("Failed to connect to Firestore emulator")
}

/// Unique suffix for test isolation against a shared backend.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Create a test app over an empty in-memory backend.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Arc::new(MemoryDb::new()))
}

#[allow(dead_code)]
pub fn create_test_app_with(backend: Arc<dyn ProfileBackend>) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let store = ProfileStore::from_config(backend, &config);

    let state = Arc::new(AppState { config, store });

    (create_router(state.clone()), state)
}

/// Create a signed session token for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 86400,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

/// Build a JSON request, optionally authenticated with a bearer token.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a body-less GET request.
#[allow(dead_code)]
pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
