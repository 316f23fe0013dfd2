// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process profile tables shared by the memory and file backends.
//!
//! Records are kept in arrival order and never removed. The id, username
//! and email indexes hold positions into `records` and are only touched
//! through `&mut self`, so a caller holding the write lock always sees the
//! record and its indexes change together.

use super::{username_key, RawUserRecord, UserFields, UserRecord};
use crate::error::AppError;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub(crate) struct ProfileTables {
    records: Vec<RawUserRecord>,
    by_id: HashMap<String, usize>,
    by_username: HashMap<String, Vec<usize>>,
    by_email: HashMap<String, Vec<usize>>,
}

impl ProfileTables {
    /// Rebuild the tables (and indexes) from previously stored documents.
    ///
    /// Documents are taken as-is, including malformed ones and duplicate
    /// usernames; lookups report every match in arrival order.
    pub(crate) fn from_records(records: Vec<RawUserRecord>) -> Self {
        let mut tables = Self::default();
        for record in records {
            tables.push(record);
        }
        tables
    }

    fn push(&mut self, record: RawUserRecord) {
        let pos = self.records.len();
        if let Some(id) = record.id() {
            self.by_id.entry(id.to_string()).or_insert(pos);
        }
        self.by_username
            .entry(record.username_key())
            .or_default()
            .push(pos);
        if let Some(email) = record.email() {
            self.by_email.entry(email.to_string()).or_default().push(pos);
        }
        self.records.push(record);
    }

    pub(crate) fn records(&self) -> &[RawUserRecord] {
        &self.records
    }

    pub(crate) fn insert(&mut self, record: &UserRecord) -> Result<(), AppError> {
        if self.by_id.contains_key(&record.id) {
            return Err(AppError::Conflict(format!(
                "User id {} already exists",
                record.id
            )));
        }
        if self.by_email.get(&record.email).is_some_and(|v| !v.is_empty()) {
            return Err(AppError::Conflict(
                "User already registered. Please login.".to_string(),
            ));
        }
        if self
            .by_username
            .get(&username_key(&record.username))
            .is_some_and(|v| !v.is_empty())
        {
            return Err(AppError::Conflict(format!(
                "Username '{}' is already taken",
                record.username
            )));
        }

        self.push(RawUserRecord::from(record));
        Ok(())
    }

    pub(crate) fn update(&mut self, id: &str, fields: &UserFields) -> Result<(), AppError> {
        let pos = *self
            .by_id
            .get(id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        let old_key = self.records[pos].username_key();
        let new_key = fields.username.as_deref().map(username_key);

        if let Some(new_key) = &new_key {
            let taken = self
                .by_username
                .get(new_key)
                .is_some_and(|holders| holders.iter().any(|&p| p != pos));
            if taken {
                return Err(AppError::Conflict(format!(
                    "Username '{}' is already taken",
                    fields.username.as_deref().unwrap_or_default()
                )));
            }
        }

        self.records[pos].apply(fields);

        if let Some(new_key) = new_key.filter(|key| *key != old_key) {
            if let Some(holders) = self.by_username.get_mut(&old_key) {
                holders.retain(|&p| p != pos);
                if holders.is_empty() {
                    self.by_username.remove(&old_key);
                }
            }
            self.by_username.entry(new_key).or_default().push(pos);
        }

        Ok(())
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<RawUserRecord> {
        self.by_id.get(id).map(|&pos| self.records[pos].clone())
    }

    pub(crate) fn by_email(&self, email: &str) -> Vec<RawUserRecord> {
        self.collect(self.by_email.get(email))
    }

    pub(crate) fn by_username(&self, username: &str) -> Vec<RawUserRecord> {
        self.collect(self.by_username.get(&username_key(username)))
    }

    fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<RawUserRecord> {
        positions
            .map(|positions| {
                positions
                    .iter()
                    .map(|&pos| self.records[pos].clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
