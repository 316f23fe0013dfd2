// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup. The persistence backend is chosen
//! here so the rest of the application only ever sees a `ProfileBackend`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Default minimum credential length (matches the original sign-up form).
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 6;

/// Default cap on decoded embedded image payloads (2 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local tables, lost on restart.
    Memory,
    /// Process-local tables mirrored to a JSON file.
    File,
    /// Hosted Firestore document store.
    Firestore,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "firestore" => Ok(Self::Firestore),
            _ => Err(ConfigError::Invalid("STORAGE_BACKEND", s.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Firestore => "firestore",
        };
        f.write_str(name)
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Selected persistence backend
    pub backend: BackendKind,
    /// JSON file used by the file backend
    pub data_file: PathBuf,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Minimum accepted credential length
    pub min_password_length: usize,
    /// Maximum decoded size of an embedded image
    pub max_image_bytes: usize,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            backend: BackendKind::Memory,
            data_file: PathBuf::from("data/profiles.json"),
            gcp_project_id: "test-project".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => BackendKind::Memory,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            backend,
            data_file: env::var("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/profiles.json")),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .trim()
                .as_bytes()
                .to_vec(),
            min_password_length: parse_or("MIN_PASSWORD_LENGTH", DEFAULT_MIN_PASSWORD_LENGTH)?,
            max_image_bytes: parse_or("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
        })
    }
}

/// Parse an optional numeric variable, rejecting values that are set but malformed.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
