//! Session management
//!
//! Two interchangeable strategies behind the `SessionManager` trait:
//! - `OpaqueSessionStore`: random tokens held server-side, keyed by username,
//!   presented back as a `username`/`token` cookie pair
//! - `SignedTokenIssuer`: HS256-signed claims with an expiry, presented as a
//!   bearer token, plus a revocation list so logout takes effect immediately
//!
//! Both keep their state in process memory behind a `tokio::sync::RwLock`, so
//! a restart invalidates every session.

mod opaque;
mod signed;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{SessionConfig, SessionStrategy};
use crate::models::{Credentials, Session, User};

pub use opaque::OpaqueSessionStore;
pub use signed::{Claims, SignedTokenIssuer};

/// Length of the generated signing secret when none is configured
const GENERATED_SECRET_BYTES: usize = 32;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session exists for the presented credentials
    #[error("Session not found")]
    Missing,

    /// The presented token does not match the server-held one
    #[error("Session token mismatch")]
    Mismatch,

    #[error("Session expired")]
    Expired,

    /// Malformed, tampered or wrongly-typed credentials
    #[error("Invalid session token: {0}")]
    Invalid(String),

    /// A token could not be minted
    #[error("Failed to mint session token: {0}")]
    Signing(String),
}

/// Issues, validates and revokes sessions
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Mint a session for an authenticated user
    async fn issue(&self, user: &User) -> Result<Session, SessionError>;

    /// Check presented credentials and return the session they carry
    async fn validate(&self, credentials: &Credentials) -> Result<Session, SessionError>;

    /// Invalidate the session behind the credentials. Revoking an unknown or
    /// already revoked session succeeds.
    async fn revoke(&self, credentials: &Credentials) -> Result<(), SessionError>;

    /// Which strategy this manager implements, and so which carrier it accepts
    fn strategy(&self) -> SessionStrategy;
}

/// Build the session manager selected by configuration
pub fn from_config(config: &SessionConfig) -> Result<Arc<dyn SessionManager>, SessionError> {
    match config.strategy {
        SessionStrategy::Opaque => {
            tracing::info!(token_bytes = config.token_bytes, "using opaque cookie sessions");
            Ok(Arc::new(OpaqueSessionStore::new(config.token_bytes)))
        }
        SessionStrategy::Signed => {
            let secret = match &config.secret {
                Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
                _ => {
                    tracing::warn!(
                        "no session secret configured, generated a random one; signed tokens will not survive a restart"
                    );
                    random_bytes(GENERATED_SECRET_BYTES)?
                }
            };
            tracing::info!(ttl_seconds = config.ttl_seconds, "using signed bearer tokens");
            Ok(Arc::new(SignedTokenIssuer::new(&secret, config.ttl_seconds)))
        }
    }
}

/// Fill a buffer from the operating system's random source
fn random_bytes(len: usize) -> Result<Vec<u8>, SessionError> {
    let mut buf = vec![0u8; len];
    getrandom::fill(&mut buf).map_err(|e| SessionError::Signing(format!("entropy source: {}", e)))?;
    Ok(buf)
}

/// Compare two byte strings without short-circuiting on the first difference
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
