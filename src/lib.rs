// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Community Portfolio: member directory and self-service profile pages.
//!
//! This crate provides the backend API behind the community site: members
//! register and log in, browse the directory, and edit their own portfolio
//! (bio, skills, projects, experience, contact links, images).

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::ProfileStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: ProfileStore,
}
