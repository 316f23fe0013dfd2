// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partial updates to a user's profile.

use super::user::{Contact, Portfolio, Project};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A profile edit: optional rename plus an optional portfolio patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub portfolio: Option<PortfolioPatch>,
}

/// Shallow portfolio patch.
///
/// Scalars overwrite, `contact` merges key by key, lists replace the whole
/// existing list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PortfolioPatch {
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub about_me: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactPatch>,
    #[serde(default)]
    pub skills_list: Option<Vec<String>>,
    #[serde(default)]
    pub projects: Option<Vec<Project>>,
    #[serde(default)]
    pub experience_list: Option<Vec<String>>,
    #[serde(default)]
    pub education_list: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ContactPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl ContactPatch {
    pub fn apply_to(self, contact: &mut Contact) {
        overwrite(&mut contact.email, self.email);
        overwrite(&mut contact.phone, self.phone);
        overwrite(&mut contact.location, self.location);
        overwrite(&mut contact.linkedin, self.linkedin);
        overwrite(&mut contact.github, self.github);
        overwrite(&mut contact.website, self.website);
    }
}

impl PortfolioPatch {
    /// Merge this patch over an existing portfolio.
    pub fn apply_to(self, portfolio: &mut Portfolio) {
        overwrite(&mut portfolio.tagline, self.tagline);
        overwrite(&mut portfolio.about_me, self.about_me);
        overwrite(&mut portfolio.profile_image_url, self.profile_image_url);
        if let Some(contact) = self.contact {
            contact.apply_to(&mut portfolio.contact);
        }
        overwrite(&mut portfolio.skills_list, self.skills_list);
        overwrite(&mut portfolio.projects, self.projects);
        overwrite(&mut portfolio.experience_list, self.experience_list);
        overwrite(&mut portfolio.education_list, self.education_list);
    }

    /// Every image URL this patch would write.
    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.profile_image_url
            .as_deref()
            .into_iter()
            .chain(
                self.projects
                    .iter()
                    .flatten()
                    .map(|project| project.image_url.as_str()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_merges_contact_by_key() {
        let mut portfolio = Portfolio::for_new_member("id-1", "carol", "c@x.com");
        portfolio.contact.github = "carol-gh".to_string();

        let patch = PortfolioPatch {
            contact: Some(ContactPatch {
                phone: Some("555-0100".to_string()),
                ..ContactPatch::default()
            }),
            ..PortfolioPatch::default()
        };
        patch.apply_to(&mut portfolio);

        assert_eq!(portfolio.contact.phone, "555-0100");
        assert_eq!(portfolio.contact.github, "carol-gh");
        assert_eq!(portfolio.contact.email, "c@x.com");
    }

    #[test]
    fn test_patch_replaces_lists_wholesale() {
        let mut portfolio = Portfolio::for_new_member("id-1", "carol", "c@x.com");

        let patch = PortfolioPatch {
            skills_list: Some(vec!["Rust".to_string(), "Rust".to_string()]),
            ..PortfolioPatch::default()
        };
        patch.apply_to(&mut portfolio);

        // Replacement lists are taken as given, duplicates included.
        assert_eq!(portfolio.skills_list, vec!["Rust", "Rust"]);
        assert_eq!(portfolio.tagline, crate::models::user::DEFAULT_TAGLINE);
    }

    #[test]
    fn test_patch_deserializes_partial_json() {
        let patch: PortfolioPatch =
            serde_json::from_str(r#"{"tagline":"X","contact":{"website":"w"}}"#).unwrap();

        assert_eq!(patch.tagline.as_deref(), Some("X"));
        assert!(patch.skills_list.is_none());
        assert_eq!(patch.contact.unwrap().website.as_deref(), Some("w"));
    }

    #[test]
    fn test_image_urls_covers_profile_and_projects() {
        let patch = PortfolioPatch {
            profile_image_url: Some("a".to_string()),
            projects: Some(vec![
                Project {
                    image_url: "b".to_string(),
                    ..Project::default()
                },
                Project::default(),
            ]),
            ..PortfolioPatch::default()
        };

        let urls: Vec<&str> = patch.image_urls().collect();
        assert_eq!(urls, vec!["a", "b", ""]);
    }
}
