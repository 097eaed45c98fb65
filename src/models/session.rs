//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Active session handed back to the caller after signup or login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Id of the account the session was issued for
    pub user_id: Uuid,
    /// Username the session belongs to
    pub username: String,
    /// Opaque token or signed token, depending on the strategy
    pub token: String,
    /// Issue timestamp
    pub issued_at: DateTime<Utc>,
    /// Expiration timestamp (signed tokens only)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Check expiry against a given instant; sessions without expiry never expire
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

/// Authentication carrier presented with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `username` + `token` cookie pair
    CookiePair { username: String, token: String },
    /// `Authorization: Bearer <token>` header
    Bearer(String),
}
