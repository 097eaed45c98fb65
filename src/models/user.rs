//! User model
//!
//! This module defines the User node of the social graph.
//!
//! The follow/follower/listing relations of a user are not stored on the node;
//! they are derived from FOLLOWS and SELLING edges by the graph gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User node in the graph store.
///
/// `username` and `email` are each unique across all users. `id` is a
/// generated identifier that every edge operation keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2); empty when the record was loaded without it
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new User with a freshly generated id.
    ///
    /// Note: The password must already be hashed before calling this function.
    /// Use `services::credentials::hash_password()` to hash the password.
    pub fn new(name: String, username: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }

    /// Drop the password hash so the record is safe to hand to callers.
    pub fn sanitized(mut self) -> Self {
        self.password_hash.clear();
        self
    }

    /// Whether `login` names this user by username or by email
    pub fn matches_login(&self, login: &str) -> bool {
        self.username == login || self.email == login
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{username: '{}', email: '{}'}}", self.username, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User::new(
            "Alice".to_string(),
            "alice".to_string(),
            "alice@x.com".to_string(),
            "$argon2id$hash".to_string(),
        )
    }

    #[test]
    fn test_user_new_generates_distinct_ids() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id, b.id);
        assert_eq!(a.username, "alice");
        assert_eq!(a.email, "alice@x.com");
    }

    #[test]
    fn test_serialized_user_has_no_password() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_sanitized_clears_hash() {
        let user = sample().sanitized();
        assert!(user.password_hash.is_empty());
    }

    #[test]
    fn test_display_never_includes_hash() {
        let rendered = sample().to_string();
        assert!(rendered.contains("alice@x.com"));
        assert!(!rendered.contains("argon2"));
    }

    #[test]
    fn test_matches_login() {
        let user = sample();
        assert!(user.matches_login("alice"));
        assert!(user.matches_login("alice@x.com"));
        assert!(!user.matches_login("bob"));
    }
}
