// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON file backend.
//!
//! The whole table is held in memory and rewritten to disk after every
//! mutation. A mutation is applied to a copy first and only becomes
//! visible once the file write succeeded, so memory and disk never
//! disagree.

use super::tables::ProfileTables;
use super::{ProfileBackend, RawUserRecord, UserFields, UserRecord};
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// On-disk layout.
#[derive(Serialize, Deserialize, Default)]
struct ProfileFile {
    #[serde(default)]
    users: Vec<RawUserRecord>,
}

#[derive(Clone)]
pub struct FileDb {
    path: PathBuf,
    tables: Arc<RwLock<ProfileTables>>,
}

impl FileDb {
    /// Open (or lazily create) the data file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<ProfileFile>(&bytes).map_err(|e| {
                AppError::Backend(format!(
                    "Failed to parse profile file {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ProfileFile::default(),
            Err(e) => {
                return Err(AppError::Backend(format!(
                    "Failed to read profile file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::info!(
            path = %path.display(),
            users = file.users.len(),
            "Opened profile file"
        );

        Ok(Self {
            path,
            tables: Arc::new(RwLock::new(ProfileTables::from_records(file.users))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, tables: &ProfileTables) -> Result<(), AppError> {
        let io_err = |e: std::io::Error| {
            AppError::Backend(format!(
                "Failed to write profile file {}: {}",
                self.path.display(),
                e
            ))
        };

        let contents = serde_json::to_vec_pretty(&ProfileFile {
            users: tables.records().to_vec(),
        })
        .map_err(|e| AppError::Backend(format!("Failed to serialize profiles: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err)?;

        Ok(())
    }

    /// Apply `mutate` to a copy of the tables, persist, then publish.
    async fn mutate<F>(&self, mutate: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut ProfileTables) -> Result<(), AppError>,
    {
        let mut guard = self.tables.write().await;
        let mut next = guard.clone();
        mutate(&mut next)?;
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl ProfileBackend for FileDb {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError> {
        self.mutate(|tables| tables.insert(record)).await
    }

    async fn update_by_key(&self, id: &str, fields: &UserFields) -> Result<(), AppError> {
        self.mutate(|tables| tables.update(id, fields)).await
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
