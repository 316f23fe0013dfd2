// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile record store: registration, login, directory lookup and
//! profile edits over any [`ProfileBackend`].
//!
//! The store holds no user data of its own. Everything it returns has been
//! through [`normalize`], so callers never see a partially-shaped portfolio.

use crate::config::Config;
use crate::db::{username_key, ProfileBackend, RawUserRecord, UserFields, UserRecord};
use crate::error::{AppError, Result};
use crate::models::{Portfolio, PortfolioPatch, User};
use crate::services::credentials::{
    hash_credential_blocking, verify_credential, verify_without_account, CredentialPolicy,
};
use crate::services::images::check_image_url;
use crate::services::normalize::normalize;
use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use validator::ValidateEmail;

/// Longest accepted username.
pub const MAX_USERNAME_LEN: usize = 50;

/// Per-user locks serializing profile edits.
pub type EditLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

#[derive(Clone)]
pub struct ProfileStore {
    backend: Arc<dyn ProfileBackend>,
    policy: CredentialPolicy,
    max_image_bytes: usize,
    edit_locks: EditLocks,
}

/// Check a username and return it trimmed.
pub fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(|c| c == '/' || c.is_control()) {
        return Err(AppError::Validation(
            "Username may not contain '/' or control characters".to_string(),
        ));
    }
    Ok(username)
}

fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    if !email.validate_email() {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            email
        )));
    }
    Ok(email)
}

/// Creation timestamp with fixed precision, so stored values sort lexically.
fn creation_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ProfileStore {
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        policy: CredentialPolicy,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            backend,
            policy,
            max_image_bytes,
            edit_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn from_config(backend: Arc<dyn ProfileBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            CredentialPolicy::new(config.min_password_length),
            config.max_image_bytes,
        )
    }

    pub fn policy(&self) -> CredentialPolicy {
        self.policy
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Create a new user with a starter portfolio.
    ///
    /// Email must be unused and the username unused ignoring case.
    pub async fn register(&self, username: &str, email: &str, credential: &str) -> Result<User> {
        let username = validate_username(username)?;
        let email = validate_email(email)?;
        self.policy.check(credential)?;

        if !self.backend.query_by_email(email).await?.is_empty() {
            return Err(AppError::Conflict(
                "User already registered. Please login.".to_string(),
            ));
        }
        if !self.backend.query_by_username(username).await?.is_empty() {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let record = UserRecord {
            portfolio: Portfolio::for_new_member(&id, username, email),
            id,
            username: username.to_string(),
            email: email.to_string(),
            credential_hash: hash_credential_blocking(credential.to_string()).await?,
            created_at: creation_timestamp(),
        };

        self.backend.insert(&record).await?;

        tracing::info!(user_id = %record.id, username = %record.username, "User registered");
        Ok(record.user())
    }

    /// Log in by exact email and credential.
    ///
    /// If several records share the email, the earliest one whose
    /// credential matches wins.
    pub async fn authenticate(&self, email: &str, credential: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || credential.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let candidates = self.backend.query_by_email(email).await?;
        let credential = credential.to_string();

        let matched = tokio::task::spawn_blocking(move || first_verified(candidates, &credential))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Credential check failed: {}", e)))?;

        match matched {
            Some(raw) => {
                let user = normalize(&raw);
                tracing::info!(user_id = %user.id, "User authenticated");
                Ok(user)
            }
            None => {
                tracing::debug!("Authentication failed: no matching credentials");
                Err(AppError::NotFound(
                    "User not registered. Please check email and password or sign up.".to_string(),
                ))
            }
        }
    }

    // ─── Profile Edits ───────────────────────────────────────────

    /// Rename and/or patch the portfolio of the user currently named
    /// `target_username` (case-insensitive).
    ///
    /// All-or-nothing: a taken username or an invalid image rejects the
    /// whole edit. A blank `username_change` means "keep the current name".
    pub async fn update_profile(
        &self,
        target_username: &str,
        username_change: Option<&str>,
        patch: Option<PortfolioPatch>,
    ) -> Result<User> {
        let target = self
            .backend
            .query_by_username(target_username)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| user_not_found(target_username))?;

        let id = target
            .id()
            .ok_or_else(|| {
                AppError::Backend(format!("Stored profile '{}' has no id", target_username))
            })?
            .to_string();

        let lock = self
            .edit_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.edit_locked(&id, target_username, username_change, patch).await
        };

        // Drop the entry unless another edit holds or awaits this lock.
        self.edit_locks.remove_if(&id, |_, held| Arc::strong_count(held) == 2);
        result
    }

    /// Body of [`Self::update_profile`], run with the user's edit lock held.
    async fn edit_locked(
        &self,
        id: &str,
        target_username: &str,
        username_change: Option<&str>,
        patch: Option<PortfolioPatch>,
    ) -> Result<User> {
        // Re-read under the lock; a concurrent rename may have moved the record.
        let current = self
            .backend
            .query_by_id(id)
            .await?
            .map(|raw| normalize(&raw))
            .filter(|user| username_key(&user.username) == username_key(target_username))
            .ok_or_else(|| user_not_found(target_username))?;

        let new_username = match username_change.map(str::trim).filter(|s| !s.is_empty()) {
            Some(name) => {
                let name = validate_username(name)?;
                (name != current.username).then(|| name.to_string())
            }
            None => None,
        };

        if let Some(name) = &new_username {
            if username_key(name) != username_key(&current.username) {
                let holders = self.backend.query_by_username(name).await?;
                if holders.iter().any(|raw| raw.id() != Some(id)) {
                    return Err(AppError::Conflict(format!(
                        "Username '{}' is already taken",
                        name
                    )));
                }
            }
        }

        if let Some(patch) = &patch {
            for url in patch.image_urls() {
                check_image_url(url, self.max_image_bytes)?;
            }
        }

        let mut updated = current;
        if let Some(name) = &new_username {
            updated.username.clone_from(name);
        }
        if let Some(patch) = patch {
            patch.apply_to(&mut updated.portfolio);
        }
        let updated = normalize(&RawUserRecord::from(&updated));

        let fields = UserFields {
            username: new_username,
            portfolio: Some(updated.portfolio.clone()),
        };
        self.backend.update_by_key(id, &fields).await?;

        tracing::info!(
            user_id = %id,
            username = %updated.username,
            renamed = fields.username.is_some(),
            "Profile updated"
        );
        Ok(updated)
    }

    // ─── Directory ───────────────────────────────────────────────

    /// Every member, normalized, in backend order.
    pub async fn list(&self) -> Result<Vec<User>> {
        let records = self.backend.query_all().await?;
        Ok(records.iter().map(normalize).collect())
    }

    /// Case-insensitive lookup by current username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        if username.trim().is_empty() {
            return Ok(None);
        }
        let records = self.backend.query_by_username(username).await?;
        Ok(records.first().map(normalize))
    }

    /// Lookup by immutable id, used to restore a session.
    pub async fn find_by_id(&self, id: &str) -> Result<User> {
        self.backend
            .query_by_id(id)
            .await?
            .map(|raw| normalize(&raw))
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

/// The first candidate whose stored hash accepts `credential`.
///
/// At least one Argon2 verification runs even when there is nothing to
/// check against.
fn first_verified(candidates: Vec<RawUserRecord>, credential: &str) -> Option<RawUserRecord> {
    let mut verified_any = false;
    let matched = candidates.into_iter().find(|raw| {
        raw.credential_hash().is_some_and(|hash| {
            verified_any = true;
            verify_credential(credential, hash)
        })
    });

    if !verified_any {
        verify_without_account(credential);
    }
    matched
}

fn user_not_found(username: &str) -> AppError {
    AppError::NotFound(format!("User '{}' not found", username))
}
