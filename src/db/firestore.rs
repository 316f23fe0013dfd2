// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore backend.
//!
//! Profiles live in `profiles/{id}`. Firestore has no unique constraints,
//! so uniqueness is kept with index documents:
//! - `profile_usernames/{lowercased username}` → owning user id
//! - `profile_emails/{email}` → owning user id
//!
//! A profile and its index documents are always written in one
//! transaction. New index documents carry an `Exists(false)` precondition,
//! so of two concurrent writers claiming the same key only one commits.
//!
//! Queries never ask Firestore to order, because an `order_by` silently
//! drops documents that lack the field. Results are sorted here instead.

use super::{collections, username_key, ProfileBackend, RawUserRecord, UserFields, UserRecord};
use crate::error::AppError;
use crate::models::Portfolio;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreWritePrecondition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Profile document as written by this backend.
#[derive(Serialize, Deserialize)]
struct ProfileDocument {
    id: String,
    username: String,
    /// Lowercased username, for case-insensitive queries
    username_lower: String,
    email: String,
    credential_hash: String,
    created_at: String,
    portfolio: Portfolio,
}

/// Entry in a uniqueness index collection.
#[derive(Debug, Serialize, Deserialize)]
struct IndexDocument {
    user_id: String,
}

#[derive(Serialize, Deserialize)]
struct LookupFields {
    username_lower: String,
}

/// Prefix of the metadata keys the client adds to every document it reads.
const META_PREFIX: &str = "_firestore_";

/// Document ids may not contain `/`.
fn index_doc_id(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Backend(e.to_string())
}

/// A create-only write lost to a concurrent writer.
fn is_lost_claim(e: &FirestoreError) -> bool {
    match e {
        FirestoreError::DataConflictError(_) => true,
        FirestoreError::DatabaseError(e) => e.public.code == "FailedPrecondition",
        _ => false,
    }
}

fn commit_err(e: FirestoreError, conflict: String) -> AppError {
    if is_lost_claim(&e) {
        AppError::Conflict(conflict)
    } else {
        AppError::Backend(format!("Transaction commit failed: {}", e))
    }
}

/// Turn a document read from Firestore into a record.
///
/// Client metadata is dropped so it is never written back, and a record
/// without an `id` field takes its document id.
fn from_document(mut doc: Value) -> RawUserRecord {
    if let Value::Object(map) = &mut doc {
        let doc_id = map
            .get("_firestore_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        map.retain(|key, _| !key.starts_with(META_PREFIX));
        if let Some(doc_id) = doc_id {
            map.entry("id").or_insert(Value::String(doc_id));
        }
    }
    RawUserRecord::from(doc)
}

fn created_at(record: &RawUserRecord) -> Option<&str> {
    record.as_value().get("created_at").and_then(Value::as_str)
}

/// Oldest first. Records without a creation time keep their relative
/// order and go last.
fn sort_by_creation(records: &mut [RawUserRecord]) {
    records.sort_by(|a, b| match (created_at(a), created_at(b)) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn into_records(docs: Vec<Value>) -> Vec<RawUserRecord> {
    let mut records: Vec<RawUserRecord> = docs.into_iter().map(from_document).collect();
    sort_by_creation(&mut records);
    records
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any bearer token; an unsigned JWT avoids
        // picking up local credentials.
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

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns a backend error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Backend("Database not connected (offline mode)".to_string()))
    }

    async fn get_index(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<IndexDocument>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(&index_doc_id(key))
            .await
            .map_err(db_err)
    }

    /// Give profiles written by older versions what lookups rely on:
    /// `username_lower` and the username and email index documents. Keys
    /// already held by another profile stay with their holder, oldest
    /// profile first.
    ///
    /// Returns the number of profiles changed.
    pub async fn backfill_lookup_fields(&self) -> Result<usize, AppError> {
        let client = self.get_client()?;
        let mut changed = 0;

        for record in self.query_all().await? {
            let Some(id) = record.id() else {
                continue;
            };
            let key = record.username_key();
            let has_lower = record
                .as_value()
                .get("username_lower")
                .and_then(Value::as_str)
                == Some(key.as_str());
            let claim_username = self
                .get_index(collections::PROFILE_USERNAMES, &key)
                .await?
                .is_none();
            let email = record.email().filter(|email| !email.is_empty());
            let claim_email = match email {
                Some(email) => self
                    .get_index(collections::PROFILE_EMAILS, email)
                    .await?
                    .is_none(),
                None => false,
            };

            if has_lower && !claim_username && !claim_email {
                continue;
            }

            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Backend(format!("Failed to begin transaction: {}", e)))?;

            let lookup = LookupFields {
                username_lower: key.clone(),
            };
            if !has_lower {
                client
                    .fluent()
                    .update()
                    .fields(["username_lower"])
                    .in_col(collections::PROFILES)
                    .document_id(id)
                    .object(&lookup)
                    .add_to_transaction(&mut transaction)
                    .map_err(db_err)?;
            }

            let index = IndexDocument {
                user_id: id.to_string(),
            };
            let mut claims = Vec::new();
            if claim_username {
                claims.push((collections::PROFILE_USERNAMES, key.as_str()));
            }
            if let Some(email) = email.filter(|_| claim_email) {
                claims.push((collections::PROFILE_EMAILS, email));
            }
            for (collection, claimed) in claims {
                client
                    .fluent()
                    .update()
                    .in_col(collection)
                    .precondition(FirestoreWritePrecondition::Exists(false))
                    .document_id(index_doc_id(claimed))
                    .object(&index)
                    .add_to_transaction(&mut transaction)
                    .map_err(db_err)?;
            }

            match transaction.commit().await {
                Ok(_) => changed += 1,
                Err(e) if is_lost_claim(&e) => {
                    tracing::warn!(user_id = id, "Lookup key claimed concurrently, skipping");
                }
                Err(e) => {
                    return Err(AppError::Backend(format!(
                        "Transaction commit failed: {}",
                        e
                    )))
                }
            }
        }

        if changed > 0 {
            tracing::info!(changed, "Backfilled profile lookup fields");
        }
        Ok(changed)
    }
}

#[async_trait]
impl ProfileBackend for FirestoreDb {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError> {
        let client = self.get_client()?;
        let username_lower = username_key(&record.username);

        // Early answers with a precise message. The preconditions below
        // decide races.
        if self
            .get_index(collections::PROFILE_EMAILS, &record.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User already registered. Please login.".to_string(),
            ));
        }
        if self
            .get_index(collections::PROFILE_USERNAMES, &username_lower)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                record.username
            )));
        }

        let document = ProfileDocument {
            id: record.id.clone(),
            username: record.username.clone(),
            username_lower: username_lower.clone(),
            email: record.email.clone(),
            credential_hash: record.credential_hash.clone(),
            created_at: record.created_at.clone(),
            portfolio: record.portfolio.clone(),
        };
        let index = IndexDocument {
            user_id: record.id.clone(),
        };

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(&record.id)
            .object(&document)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILE_EMAILS)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(index_doc_id(&record.email))
            .object(&index)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILE_USERNAMES)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .document_id(index_doc_id(&username_lower))
            .object(&index)
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        transaction.commit().await.map_err(|e| {
            commit_err(e, "Username or email is already registered".to_string())
        })?;

        tracing::debug!(user_id = %record.id, "Profile inserted");
        Ok(())
    }

    async fn update_by_key(&self, id: &str, fields: &UserFields) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut current = self
            .query_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let old_key = current.username_key();
        let new_key = fields
            .username
            .as_deref()
            .map(username_key)
            .filter(|key| *key != old_key);
        let taken = || {
            format!(
                "Username '{}' is already taken",
                fields.username.as_deref().unwrap_or_default()
            )
        };

        let mut claim_new = false;
        let mut release_old = false;
        if let Some(new_key) = &new_key {
            match self
                .get_index(collections::PROFILE_USERNAMES, new_key)
                .await?
            {
                Some(holder) if holder.user_id != id => {
                    return Err(AppError::Conflict(taken()));
                }
                Some(_) => {}
                None => claim_new = true,
            }
            // Nameless profiles share a key; only its holder releases it.
            release_old = self
                .get_index(collections::PROFILE_USERNAMES, &old_key)
                .await?
                .is_some_and(|holder| holder.user_id == id);
        }

        current.apply(fields);
        let username_lower = current.username_key();
        if let Value::Object(map) = &mut current.0 {
            map.insert("username_lower".to_string(), Value::String(username_lower));
        }

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(id)
            .object(current.as_value())
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        if release_old {
            client
                .fluent()
                .delete()
                .from(collections::PROFILE_USERNAMES)
                .document_id(index_doc_id(&old_key))
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        if let Some(new_key) = new_key.as_deref().filter(|_| claim_new) {
            client
                .fluent()
                .update()
                .in_col(collections::PROFILE_USERNAMES)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(index_doc_id(new_key))
                .object(&IndexDocument {
                    user_id: id.to_string(),
                })
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| commit_err(e, taken()))?;

        tracing::debug!(user_id = id, renamed = new_key.is_some(), "Profile updated");
        Ok(())
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<RawUserRecord>, AppError> {
        let doc: Option<Value> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(id)
            .await
            .map_err(db_err)?;

        Ok(doc.map(from_document))
    }

    async fn query_by_email(&self, email: &str) -> Result<Vec<RawUserRecord>, AppError> {
        let docs: Vec<Value> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(|q| q.for_all([q.field("email").eq(email)]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(into_records(docs))
    }

    async fn query_by_username(&self, username: &str) -> Result<Vec<RawUserRecord>, AppError> {
        let key = username_key(username);
        let docs: Vec<Value> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(|q| q.for_all([q.field("username_lower").eq(key.as_str())]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(into_records(docs))
    }

    async fn query_all(&self) -> Result<Vec<RawUserRecord>, AppError> {
        let docs: Vec<Value> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .obj()
            .query()
            .await
            .map_err(db_err)?;

        Ok(into_records(docs))
    }
}
