// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod images;
pub mod normalize;
pub mod profile_store;
pub mod session;

pub use credentials::CredentialPolicy;
pub use normalize::normalize;
pub use profile_store::ProfileStore;
pub use session::{apply_optimistic_update, EditState, SessionContext};
