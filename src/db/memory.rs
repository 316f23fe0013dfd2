// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local backend. Used for development and tests.

use super::tables::ProfileTables;
use super::{ProfileBackend, RawUserRecord, UserFields, UserRecord};
use crate::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory profile store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<ProfileTables>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing documents, which may be malformed.
    pub fn with_records(records: Vec<RawUserRecord>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(ProfileTables::from_records(records))),
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.tables.read().await.records().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ProfileBackend for MemoryDb {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError> {
        self.tables.write().await.insert(record)
    }

    async fn update_by_key(&self, id: &str, fields: &UserFields) -> Result<(), AppError> {
        self.tables.write().await.update(id, fields)
    }

    async fn query_by_id(&self, id: &str) -> Result<Option<RawUserRecord>, AppError> {
        Ok(self.tables.read().await.by_id(id))
    }

    async fn query_by_email(&self, email: &str) -> Result<Vec<RawUserRecord>, AppError> {
        Ok(self.tables.read().await.by_email(email))
    }

    async fn query_by_username(&self, username: &str) -> Result<Vec<RawUserRecord>, AppError> {
        Ok(self.tables.read().await.by_username(username))
    }

    async fn query_all(&self) -> Result<Vec<RawUserRecord>, AppError> {
        Ok(self.tables.read().await.records().to_vec())
    }
}
