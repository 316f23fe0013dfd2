// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User and portfolio models for storage and API.
//!
//! Field names on the wire match the stored documents (`about_me`,
//! `skills_list`, project `imageUrl`, ...) so records written by older
//! clients keep loading.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Placeholder tagline for new and incomplete portfolios.
pub const DEFAULT_TAGLINE: &str = "AI Enthusiast & Lifelong Learner";

/// Skills every new member starts with.
pub const STARTER_SKILLS: [&str; 2] = ["AI", "Machine Learning"];

/// Username shown for stored records that have none.
pub const UNKNOWN_USERNAME: &str = "Unknown";

/// A registered member, as handed to the presentation layer.
///
/// Never carries the credential; see [`crate::db::UserRecord`] for the
/// stored form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct User {
    /// Opaque identifier assigned at registration
    pub id: String,
    /// Display name and URL slug (unique, case-insensitive)
    pub username: String,
    /// Login identifier (unique)
    pub email: String,
    pub portfolio: Portfolio,
}

/// The embedded portfolio page owned by every user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Portfolio {
    pub tagline: String,
    pub about_me: String,
    pub profile_image_url: String,
    pub contact: Contact,
    /// Display order is insertion order
    pub skills_list: Vec<String>,
    pub projects: Vec<Project>,
    pub experience_list: Vec<String>,
    pub education_list: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Contact {
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub link: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

/// Deterministic placeholder avatar for a user id.
pub fn placeholder_avatar_url(id: &str) -> String {
    format!("https://i.pravatar.cc/150?u={}", urlencoding::encode(id))
}

impl Portfolio {
    /// Defaults applied to stored records with missing fields.
    ///
    /// `profile_image_url` is left empty; normalization replaces an empty
    /// image with the placeholder derived from the user id.
    pub fn template(username: &str) -> Self {
        Self {
            tagline: DEFAULT_TAGLINE.to_string(),
            about_me: format!("Hello, I'm {}.", username),
            profile_image_url: String::new(),
            contact: Contact::default(),
            skills_list: Vec::new(),
            projects: Vec::new(),
            experience_list: Vec::new(),
            education_list: Vec::new(),
        }
    }

    /// Portfolio created together with a new account.
    pub fn for_new_member(id: &str, username: &str, email: &str) -> Self {
        Self {
            about_me: format!("Hello, I'm {}. I'm new here!", username),
            profile_image_url: placeholder_avatar_url(id),
            contact: Contact {
                email: email.to_string(),
                ..Contact::default()
            },
            skills_list: STARTER_SKILLS.iter().map(|s| s.to_string()).collect(),
            ..Self::template(username)
        }
    }

    /// Append a skill unless it is blank or already listed.
    ///
    /// Returns `true` if the skill was added.
    pub fn add_skill(&mut self, skill: &str) -> bool {
        let skill = skill.trim();
        if skill.is_empty() || self.skills_list.iter().any(|s| s == skill) {
            return false;
        }
        self.skills_list.push(skill.to_string());
        true
    }

    /// Remove every occurrence of a skill. Returns `true` if anything was removed.
    pub fn remove_skill(&mut self, skill: &str) -> bool {
        let before = self.skills_list.len();
        self.skills_list.retain(|s| s != skill);
        self.skills_list.len() != before
    }

    /// Append an empty project entry and return its index.
    pub fn add_project(&mut self) -> usize {
        self.projects.push(Project::default());
        self.projects.len() - 1
    }

    /// Remove the project at `index`, if present.
    pub fn remove_project(&mut self, index: usize) -> Option<Project> {
        (index < self.projects.len()).then(|| self.projects.remove(index))
    }
}
