// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Turn stored documents of any shape into complete [`User`] values.
//!
//! Defaulting order:
//! 1. start from [`Portfolio::template`] seeded with the username
//! 2. take each scalar portfolio field from the document if it is a string
//! 3. merge `contact` key by key
//! 4. take list fields only if they really are arrays
//! 5. replace an empty profile image with the id-derived placeholder
//!
//! `normalize` never fails, and normalizing its own output is a no-op.

use crate::db::RawUserRecord;
use crate::models::user::placeholder_avatar_url;
use crate::models::{Contact, Portfolio, Project, User};
use serde_json::{Map, Value};

pub use crate::models::user::UNKNOWN_USERNAME;

pub fn normalize(raw: &RawUserRecord) -> User {
    let id = raw.id().unwrap_or_default().to_string();
    let username = raw.display_username().to_string();
    let email = raw.email().unwrap_or_default().to_string();

    let mut portfolio = Portfolio::template(&username);
    if let Some(Value::Object(source)) = raw.as_value().get("portfolio") {
        merge_portfolio(&mut portfolio, source);
    }
    if portfolio.profile_image_url.is_empty() {
        portfolio.profile_image_url = placeholder_avatar_url(&id);
    }

    User {
        id,
        username,
        email,
        portfolio,
    }
}

fn merge_portfolio(portfolio: &mut Portfolio, source: &Map<String, Value>) {
    take_string(source, "tagline", &mut portfolio.tagline);
    take_string(source, "about_me", &mut portfolio.about_me);
    take_string(source, "profile_image_url", &mut portfolio.profile_image_url);

    if let Some(Value::Object(contact)) = source.get("contact") {
        merge_contact(&mut portfolio.contact, contact);
    }

    portfolio.skills_list = string_list(source.get("skills_list"));
    portfolio.projects = project_list(source.get("projects"));
    portfolio.experience_list = string_list(source.get("experience_list"));
    portfolio.education_list = string_list(source.get("education_list"));
}

fn merge_contact(contact: &mut Contact, source: &Map<String, Value>) {
    take_string(source, "email", &mut contact.email);
    take_string(source, "phone", &mut contact.phone);
    take_string(source, "location", &mut contact.location);
    take_string(source, "linkedin", &mut contact.linkedin);
    take_string(source, "github", &mut contact.github);
    take_string(source, "website", &mut contact.website);
}

/// Overwrite `slot` only when the document holds a string under `key`.
fn take_string(source: &Map<String, Value>, key: &str, slot: &mut String) {
    if let Some(Value::String(value)) = source.get(key) {
        slot.clone_from(value);
    }
}

/// String elements of an array, in order. Anything else yields an empty list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn project_list(value: Option<&Value>) -> Vec<Project> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::Object(fields) => {
                let mut project = Project::default();
                take_string(fields, "title", &mut project.title);
                take_string(fields, "description", &mut project.description);
                take_string(fields, "link", &mut project.link);
                take_string(fields, "imageUrl", &mut project.image_url);
                Some(project)
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::DEFAULT_TAGLINE;
    use serde_json::json;

    fn renormalize(user: &User) -> User {
        normalize(&RawUserRecord::from(user))
    }

    #[test]
    fn test_missing_portfolio_gets_defaults() {
        let user = normalize(&RawUserRecord::from(json!({
            "id": "u1",
            "username": "amy",
            "email": "amy@x.com"
        })));

        assert_eq!(user.id, "u1");
        assert_eq!(user.portfolio.tagline, DEFAULT_TAGLINE);
        assert_eq!(user.portfolio.about_me, "Hello, I'm amy.");
        assert_eq!(
            user.portfolio.profile_image_url,
            "https://i.pravatar.cc/150?u=u1"
        );
        assert_eq!(user.portfolio.contact, Contact::default());
        assert!(user.portfolio.skills_list.is_empty());
        assert!(user.portfolio.projects.is_empty());
    }

    #[test]
    fn test_non_list_skills_become_empty() {
        for bad in [json!("Rust, Go"), json!(null), json!(42), json!({"0": "Rust"})] {
            let user = normalize(&RawUserRecord::from(json!({
                "id": "u1",
                "username": "amy",
                "portfolio": {"skills_list": bad}
            })));
            assert!(user.portfolio.skills_list.is_empty());
        }
    }

    #[test]
    fn test_scalars_and_contact_merge() {
        let user = normalize(&RawUserRecord::from(json!({
            "id": "u1",
            "username": "amy",
            "portfolio": {
                "tagline": "Builder",
                "about_me": 17,
                "contact": {"github": "amy-gh", "phone": null}
            }
        })));

        assert_eq!(user.portfolio.tagline, "Builder");
        assert_eq!(user.portfolio.about_me, "Hello, I'm amy.");
        assert_eq!(user.portfolio.contact.github, "amy-gh");
        assert_eq!(user.portfolio.contact.phone, "");
        assert_eq!(user.portfolio.contact.email, "");
    }

    #[test]
    fn test_list_elements_are_filtered() {
        let user = normalize(&RawUserRecord::from(json!({
            "id": "u1",
            "username": "amy",
            "portfolio": {
                "skills_list": ["Rust", 3, null, "Go"],
                "projects": [
                    {"title": "Site", "imageUrl": "https://img"},
                    "not a project",
                    {"description": 5}
                ],
                "experience_list": ["Acme 2020-2024"]
            }
        })));

        assert_eq!(user.portfolio.skills_list, vec!["Rust", "Go"]);
        assert_eq!(user.portfolio.projects.len(), 2);
        assert_eq!(user.portfolio.projects[0].title, "Site");
        assert_eq!(user.portfolio.projects[0].image_url, "https://img");
        assert_eq!(user.portfolio.projects[1], Project::default());
        assert_eq!(user.portfolio.experience_list, vec!["Acme 2020-2024"]);
        assert!(user.portfolio.education_list.is_empty());
    }

    #[test]
    fn test_empty_image_uses_placeholder() {
        let user = normalize(&RawUserRecord::from(json!({
            "id": "u 1",
            "username": "amy",
            "portfolio": {"profile_image_url": ""}
        })));
        assert_eq!(
            user.portfolio.profile_image_url,
            "https://i.pravatar.cc/150?u=u%201"
        );
    }

    #[test]
    fn test_missing_identity_fields() {
        let user = normalize(&RawUserRecord::from(json!({"username": ""})));
        assert_eq!(user.id, "");
        assert_eq!(user.username, UNKNOWN_USERNAME);
        assert_eq!(user.email, "");
        assert_eq!(user.portfolio.about_me, "Hello, I'm Unknown.");
    }

    #[test]
    fn test_normalize_is_total_and_idempotent() {
        let inputs = [
            json!(null),
            json!("just a string"),
            json!([1, 2, 3]),
            json!({}),
            json!({"id": 5, "username": ["x"], "portfolio": "nope"}),
            json!({"id": "u1", "username": "amy", "portfolio": {"contact": "x", "projects": {}}}),
            json!({
                "id": "u2",
                "username": "bob",
                "email": "b@x.com",
                "portfolio": {
                    "tagline": "",
                    "skills_list": ["AI", "AI"],
                    "projects": [{"title": "t", "link": "l"}],
                    "education_list": "MIT"
                }
            }),
        ];

        for input in inputs {
            let once = normalize(&RawUserRecord::from(input));
            assert_eq!(renormalize(&once), once);
        }
    }

    #[test]
    fn test_duplicate_skills_are_not_deduplicated() {
        let user = normalize(&RawUserRecord::from(json!({
            "id": "u1",
            "username": "amy",
            "portfolio": {"skills_list": ["AI", "AI"]}
        })));
        assert_eq!(user.portfolio.skills_list, vec!["AI", "AI"]);
    }
}
