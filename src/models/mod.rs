// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod patch;
pub mod user;

pub use patch::{ContactPatch, PortfolioPatch, ProfileUpdate};
pub use user::{Contact, Portfolio, Project, User};
