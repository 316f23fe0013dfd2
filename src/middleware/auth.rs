// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "community_token";

/// Session lifetime in seconds (30 days).
pub const SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Middleware that requires a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Cookie first, then bearer header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
            Some(token) => token.to_string(),
            None => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let user_id = verify_jwt(&token, &state.config.jwt_signing_key)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}

/// Decode a session token and return its user id.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    Some(token_data.claims.sub).filter(|sub| !sub.is_empty())
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now as usize,
        exp: (now + SESSION_TTL_SECS) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

    #[test]
    fn test_jwt_roundtrip() {
        let token = create_jwt("0b6f-user", KEY).unwrap();
        assert_eq!(verify_jwt(&token, KEY).as_deref(), Some("0b6f-user"));
    }

    #[test]
    fn test_jwt_wrong_key_rejected() {
        let token = create_jwt("0b6f-user", KEY).unwrap();
        assert!(verify_jwt(&token, b"another_key_entirely_32_bytes!!!").is_none());
        assert!(verify_jwt("not.a.token", KEY).is_none());
    }
}
