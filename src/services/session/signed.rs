//! Signed stateless session tokens (HS256)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionError, SessionManager};
use crate::config::SessionStrategy;
use crate::models::{Credentials, Session, User};

/// Claim set carried by a signed token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id of the account the token was issued for
    pub sub: String,
    /// Username of the session owner
    pub username: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds, exclusive)
    pub exp: i64,
    /// Token id, the revocation key
    pub jti: String,
}

/// Issues and verifies HS256 tokens with a server-held secret
pub struct SignedTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
    /// Revoked token ids with their expiry
    revoked: Arc<RwLock<HashMap<String, i64>>>,
}

impl SignedTokenIssuer {
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against an explicit clock in `validate_at`
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Mint a token as of `now`
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat,
            exp: iat.saturating_add(self.ttl_seconds),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign session token");
            SessionError::Signing(e.to_string())
        })?;

        Ok(Session {
            user_id: user.id,
            username: claims.username,
            token,
            issued_at: timestamp(iat)?,
            expires_at: Some(timestamp(claims.exp)?),
        })
    }

    /// Verify signature, revocation and `now < exp`
    pub async fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Session, SessionError> {
        let claims = self.decode_claims(token)?;

        if self.revoked.read().await.contains_key(&claims.jti) {
            return Err(SessionError::Invalid("token has been revoked".to_string()));
        }
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| SessionError::Invalid(format!("malformed subject: {}", e)))?;

        let session = Session {
            user_id,
            username: claims.username,
            token: token.to_string(),
            issued_at: timestamp(claims.iat)?,
            expires_at: Some(timestamp(claims.exp)?),
        };
        if session.is_expired_at(now) {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    /// Add a token to the revocation list, dropping entries that have expired by `now`
    pub async fn revoke_at(&self, token: &str, now: DateTime<Utc>) {
        let claims = match self.decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring revocation of an unverifiable token");
                return;
            }
        };

        let now = now.timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        if claims.exp > now {
            revoked.insert(claims.jti, claims.exp);
        }
    }

    /// Number of revoked tokens still tracked
    pub async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, SessionError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::Invalid(e.to_string()))
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, SessionError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| SessionError::Invalid(format!("timestamp out of range: {}", secs)))
}

fn bearer(credentials: &Credentials) -> Result<&str, SessionError> {
    match credentials {
        Credentials::Bearer(token) => Ok(token),
        Credentials::CookiePair { .. } => Err(SessionError::Invalid("expected a bearer token".to_string())),
    }
}

#[async_trait]
impl SessionManager for SignedTokenIssuer {
    async fn issue(&self, user: &User) -> Result<Session, SessionError> {
        self.issue_at(user, Utc::now())
    }

    async fn validate(&self, credentials: &Credentials) -> Result<Session, SessionError> {
        self.validate_at(bearer(credentials)?, Utc::now()).await
    }

    async fn revoke(&self, credentials: &Credentials) -> Result<(), SessionError> {
        self.revoke_at(bearer(credentials)?, Utc::now()).await;
        Ok(())
    }

    fn strategy(&self) -> SessionStrategy {
        SessionStrategy::Signed
    }
}
