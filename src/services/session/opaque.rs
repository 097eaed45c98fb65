//! Server-held opaque session tokens

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{constant_time_eq, random_bytes, SessionError, SessionManager};
use crate::config::SessionStrategy;
use crate::models::{Credentials, Session, User};

#[derive(Debug, Clone)]
struct Entry {
    user_id: Uuid,
    token: String,
    issued_at: DateTime<Utc>,
}

/// In-memory `username -> token` mapping.
///
/// One active session per username: issuing a new one replaces the old token.
/// Presenting a wrong token for a username purges that username's session.
pub struct OpaqueSessionStore {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    token_bytes: usize,
}

impl OpaqueSessionStore {
    pub fn new(token_bytes: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            token_bytes,
        }
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn generate_token(&self) -> Result<String, SessionError> {
        Ok(BASE64URL_NOPAD.encode(&random_bytes(self.token_bytes)?))
    }
}

#[async_trait]
impl SessionManager for OpaqueSessionStore {
    async fn issue(&self, user: &User) -> Result<Session, SessionError> {
        let token = self.generate_token()?;
        let issued_at = Utc::now();

        self.sessions.write().await.insert(
            user.username.clone(),
            Entry {
                user_id: user.id,
                token: token.clone(),
                issued_at,
            },
        );

        Ok(Session {
            user_id: user.id,
            username: user.username.clone(),
            token,
            issued_at,
            expires_at: None,
        })
    }

    async fn validate(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        let (username, token) = match credentials {
            Credentials::CookiePair { username, token } => (username, token),
            Credentials::Bearer(_) => {
                return Err(SessionError::Invalid("expected a username/token cookie pair".to_string()))
            }
        };

        let entry = self
            .sessions
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(SessionError::Missing)?;

        if constant_time_eq(entry.token.as_bytes(), token.as_bytes()) {
            return Ok(Session {
                user_id: entry.user_id,
                username: username.clone(),
                token: entry.token,
                issued_at: entry.issued_at,
                expires_at: None,
            });
        }

        // Purge, unless the session was reissued since it was read
        let mut sessions = self.sessions.write().await;
        if sessions
            .get(username)
            .is_some_and(|current| current.token == entry.token)
        {
            sessions.remove(username);
        }
        tracing::warn!(%username, "session token mismatch, session purged");
        Err(SessionError::Mismatch)
    }

    async fn revoke(&self, credentials: &Credentials) -> Result<(), SessionError> {
        match credentials {
            Credentials::CookiePair { username, .. } => {
                self.sessions.write().await.remove(username);
                Ok(())
            }
            Credentials::Bearer(_) => Err(SessionError::Invalid(
                "expected a username/token cookie pair".to_string(),
            )),
        }
    }

    fn strategy(&self) -> SessionStrategy {
        SessionStrategy::Opaque
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str) -> User {
        User::new(
            username.to_string(),
            username.to_string(),
            format!("{}@x.com", username),
            "hash".to_string(),
        )
    }

    fn cookies(session: &Session) -> Credentials {
        Credentials::CookiePair {
            username: session.username.clone(),
            token: session.token.clone(),
        }
    }

    #[tokio::test]
    async fn test_issue_and_validate() {
        let store = OpaqueSessionStore::new(32);
        let session = store.issue(&user("alice")).await.unwrap();

        // 32 bytes, base64url without padding
        assert_eq!(session.token.len(), 43);
        assert!(session.expires_at.is_none());

        let validated = store.validate(&cookies(&session)).await.unwrap();
        assert_eq!(validated.username, "alice");
        assert_eq!(validated.user_id, session.user_id);
        assert_eq!(validated.token, session.token);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let store = OpaqueSessionStore::new(32);
        let a = store.issue(&user("alice")).await.unwrap();
        let b = store.issue(&user("bob")).await.unwrap();
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_unknown_username_is_missing() {
        let store = OpaqueSessionStore::new(32);
        let creds = Credentials::CookiePair {
            username: "ghost".to_string(),
            token: "anything".to_string(),
        };
        assert!(matches!(store.validate(&creds).await, Err(SessionError::Missing)));
    }

    #[tokio::test]
    async fn test_mismatch_purges_session() {
        let store = OpaqueSessionStore::new(32);
        let session = store.issue(&user("alice")).await.unwrap();

        let forged = Credentials::CookiePair {
            username: "alice".to_string(),
            token: "forged".to_string(),
        };
        assert!(matches!(store.validate(&forged).await, Err(SessionError::Mismatch)));

        // The genuine token is gone too
        assert!(matches!(
            store.validate(&cookies(&session)).await,
            Err(SessionError::Missing)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_immediately_after_logout() {
        let store = OpaqueSessionStore::new(32);
        let session = store.issue(&user("alice")).await.unwrap();
        assert!(store.validate(&cookies(&session)).await.is_ok());

        store.revoke(&cookies(&session)).await.unwrap();
        assert!(store.validate(&cookies(&session)).await.is_err());

        // Logout is idempotent
        store.revoke(&cookies(&session)).await.unwrap();
    }

    #[tokio::test]
    async fn test_reissue_replaces_token() {
        let store = OpaqueSessionStore::new(32);
        let first = store.issue(&user("alice")).await.unwrap();
        let second = store.issue(&user("alice")).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.validate(&cookies(&second)).await.is_ok());
        assert!(matches!(
            store.validate(&cookies(&first)).await,
            Err(SessionError::Mismatch)
        ));
    }

    #[tokio::test]
    async fn test_bearer_rejected() {
        let store = OpaqueSessionStore::new(32);
        let result = store.validate(&Credentials::Bearer("token".to_string())).await;
        assert!(matches!(result, Err(SessionError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_concurrent_issue_and_validate() {
        let store = Arc::new(OpaqueSessionStore::new(32));

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let session = store.issue(&user(&format!("user{}", i))).await.unwrap();
                    store.validate(&cookies(&session)).await.unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len().await, 32);
    }
}
