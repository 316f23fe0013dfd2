// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session context owned by a client of the store.
//!
//! Holds the signed-in user and applies profile edits optimistically: the
//! local view changes immediately, and is either replaced by the stored
//! result or restored from a snapshot once the write resolves.
//!
//! ```text
//! Idle ──begin_edit──▶ Pending ──commit──▶ Committed
//!                         │
//!                         └──roll_back──▶ RolledBack
//! ```
//!
//! Only one edit may be pending at a time.

use crate::error::{AppError, Result};
use crate::models::{ProfileUpdate, User};
use crate::services::ProfileStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EditState {
    #[default]
    Idle,
    /// An edit was applied locally; `snapshot` is the view before it.
    Pending { snapshot: User },
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    user: Option<User>,
    edit: EditState,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            edit: EditState::Idle,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.edit, EditState::Pending { .. })
    }

    pub fn sign_in(&mut self, user: User) {
        self.user = Some(user);
        self.edit = EditState::Idle;
    }

    pub fn sign_out(&mut self) {
        self.user = None;
        self.edit = EditState::Idle;
    }

    /// Apply `update` to the local view and remember the prior state.
    pub fn begin_edit(&mut self, update: &ProfileUpdate) -> Result<&User> {
        if self.is_pending() {
            return Err(AppError::Conflict(
                "Another profile edit is still in progress".to_string(),
            ));
        }
        let user = self.user.as_mut().ok_or(AppError::Unauthorized)?;
        let snapshot = user.clone();

        if let Some(name) = update
            .username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            user.username = name.to_string();
        }
        if let Some(patch) = update.portfolio.clone() {
            patch.apply_to(&mut user.portfolio);
        }

        self.edit = EditState::Pending { snapshot };
        Ok(user)
    }

    /// Replace the optimistic view with the stored result.
    pub fn commit(&mut self, confirmed: User) -> Result<()> {
        if !self.is_pending() {
            return Err(AppError::Validation("No profile edit in progress".to_string()));
        }
        self.user = Some(confirmed);
        self.edit = EditState::Committed;
        Ok(())
    }

    /// Restore the view from before the pending edit.
    pub fn roll_back(&mut self) -> Result<()> {
        match std::mem::take(&mut self.edit) {
            EditState::Pending { snapshot } => {
                self.user = Some(snapshot);
                self.edit = EditState::RolledBack;
                Ok(())
            }
            other => {
                self.edit = other;
                Err(AppError::Validation("No profile edit in progress".to_string()))
            }
        }
    }
}

/// Run one optimistic edit of the signed-in user's profile end to end.
pub async fn apply_optimistic_update(
    store: &ProfileStore,
    session: &mut SessionContext,
    update: ProfileUpdate,
) -> Result<User> {
    let target = session
        .current_user()
        .map(|user| user.username.clone())
        .ok_or(AppError::Unauthorized)?;

    session.begin_edit(&update)?;

    match store
        .update_profile(&target, update.username.as_deref(), update.portfolio)
        .await
    {
        Ok(user) => {
            session.commit(user.clone())?;
            Ok(user)
        }
        Err(e) => {
            tracing::warn!(username = %target, error = %e, "Profile edit failed, rolling back");
            session.roll_back()?;
            Err(e)
        }
    }
}
