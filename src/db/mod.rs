// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer.
//!
//! The profile store talks to storage only through [`ProfileBackend`].
//! Three implementations exist (in-memory, JSON file, Firestore) and one is
//! chosen at startup from [`Config::backend`].

pub mod file;
pub mod firestore;
pub mod memory;
mod tables;

pub use file::FileDb;
pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::config::{BackendKind, Config};
use crate::error::AppError;
use crate::models::user::UNKNOWN_USERNAME;
use crate::models::{Portfolio, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    /// Username index, keyed by the lowercased username
    pub const PROFILE_USERNAMES: &str = "profile_usernames";
    /// Email index, keyed by the exact email
    pub const PROFILE_EMAILS: &str = "profile_emails";
}

/// Storage operations required by the profile store.
///
/// Query results come back as raw documents in creation order; callers
/// normalize them before use. `insert` and `update_by_key` enforce the
/// uniqueness constraints themselves and report violations as
/// [`AppError::Conflict`].
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Store a new record. Fails if the id, email, or username is taken.
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError>;

    /// Partially update the record with the given immutable id.
    ///
    /// A username change must move the username index in the same step.
    async fn update_by_key(&self, id: &str, fields: &UserFields) -> Result<(), AppError>;

    async fn query_by_id(&self, id: &str) -> Result<Option<RawUserRecord>, AppError>;

    /// Exact match on email.
    async fn query_by_email(&self, email: &str) -> Result<Vec<RawUserRecord>, AppError>;

    /// Case-insensitive match on the name the record is listed under.
    async fn query_by_username(&self, username: &str) -> Result<Vec<RawUserRecord>, AppError>;

    async fn query_all(&self) -> Result<Vec<RawUserRecord>, AppError>;
}

/// Pick and open the configured backend.
pub async fn connect(config: &Config) -> Result<Arc<dyn ProfileBackend>, AppError> {
    tracing::info!(backend = %config.backend, "Opening persistence backend");

    let backend: Arc<dyn ProfileBackend> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryDb::new()),
        BackendKind::File => Arc::new(FileDb::open(&config.data_file).await?),
        BackendKind::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            db.backfill_lookup_fields().await?;
            Arc::new(db)
        }
    };

    Ok(backend)
}

/// Case-folded form used for username uniqueness and lookup.
pub fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

/// A stored user document of unknown completeness.
///
/// Anything may be missing or have the wrong shape (older record layouts,
/// hand edits). Only `normalize` turns this into a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawUserRecord(pub Value);

impl RawUserRecord {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    /// The name the record is listed under, [`UNKNOWN_USERNAME`] if it has
    /// none. Lookups and uniqueness use this, so every listed name resolves.
    pub fn display_username(&self) -> &str {
        self.username()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_USERNAME)
    }

    /// Key the record is found under by [`ProfileBackend::query_by_username`].
    pub fn username_key(&self) -> String {
        username_key(self.display_username())
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn credential_hash(&self) -> Option<&str> {
        self.str_field("credential_hash")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Overwrite top-level fields, turning a non-object document into one.
    fn set_fields(&mut self, fields: impl IntoIterator<Item = (&'static str, Value)>) {
        if !self.0.is_object() {
            self.0 = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.0 {
            for (key, value) in fields {
                map.insert(key.to_string(), value);
            }
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, fields: &UserFields) {
        let mut updates = Vec::new();
        if let Some(username) = &fields.username {
            updates.push(("username", Value::String(username.clone())));
        }
        if let Some(portfolio) = &fields.portfolio {
            updates.push((
                "portfolio",
                serde_json::to_value(portfolio).unwrap_or_default(),
            ));
        }
        self.set_fields(updates);
    }
}

impl From<Value> for RawUserRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&User> for RawUserRecord {
    fn from(user: &User) -> Self {
        Self(serde_json::to_value(user).unwrap_or_default())
    }
}

impl From<&UserRecord> for RawUserRecord {
    fn from(record: &UserRecord) -> Self {
        Self(serde_json::to_value(record).unwrap_or_default())
    }
}

/// Fully-shaped record written at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string; the plaintext credential is never stored
    pub credential_hash: String,
    /// Creation time (RFC 3339, fixed width so it sorts lexically)
    pub created_at: String,
    pub portfolio: Portfolio,
}

impl UserRecord {
    /// The public view of this record.
    pub fn user(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            portfolio: self.portfolio.clone(),
        }
    }
}

/// Fields that `update_by_key` may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserFields {
    pub username: Option<String>,
    pub portfolio: Option<Portfolio>,
}
