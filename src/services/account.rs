//! Account service
//!
//! Orchestrates the account and social use cases:
//! - signup, login, logout and session authentication
//! - follow / unfollow and follower / following listings
//! - user lookup and account deletion
//!
//! Each use case validates its input, runs the graph operation and then the
//! session action. Records handed back never carry a password hash.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::SessionStrategy;
use crate::db::{GatewayError, GraphGateway};
use crate::models::{Credentials, Session, User};
use crate::services::credentials::{hash_password, validate_email, verify_password, CredentialError};
use crate::services::session::{SessionError, SessionManager};

pub const MAX_USERNAME_LENGTH: usize = 64;

/// Hash checked when the login names no user, so both rejections cost the same
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("not-a-real-password").ok());

/// Error types for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Malformed or missing fields, bad email syntax, unknown users
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bad credentials or a missing, invalid or expired session
    #[error("Unauthorized")]
    Unauthorized,

    /// Username or email already registered
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The graph store is unreachable or the transaction failed
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for AccountError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ConstraintViolation(msg) => AccountError::Conflict(msg),
            GatewayError::NotFound(what) => AccountError::InvalidInput(format!("unknown {}", what)),
            GatewayError::Timeout(_) | GatewayError::Store(_) => {
                AccountError::Unavailable("graph store unavailable".to_string())
            }
            GatewayError::Corrupt(msg) => AccountError::Internal(msg),
        }
    }
}

impl From<SessionError> for AccountError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Signing(msg) => AccountError::Internal(msg),
            _ => AccountError::Unauthorized,
        }
    }
}

impl From<CredentialError> for AccountError {
    fn from(err: CredentialError) -> Self {
        AccountError::Internal(err.to_string())
    }
}

/// Input for signup
#[derive(Debug, Clone, Deserialize)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

impl SignupInput {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Input for login; `login` is a username or an email
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub login: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

/// A user/follower pair, both named by username or email
#[derive(Debug, Clone, Deserialize)]
pub struct FollowInput {
    pub user: String,
    pub follower: String,
}

impl FollowInput {
    pub fn new(user: impl Into<String>, follower: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            follower: follower.into(),
        }
    }
}

/// Outcome of a successful signup or login
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// The user, without password hash
    pub user: User,
    pub session: Session,
}

/// Account service
pub struct AccountService {
    gateway: Arc<dyn GraphGateway>,
    sessions: Arc<dyn SessionManager>,
}

impl AccountService {
    pub fn new(gateway: Arc<dyn GraphGateway>, sessions: Arc<dyn SessionManager>) -> Self {
        Self { gateway, sessions }
    }

    /// Strategy of the session manager, which decides the credential carrier
    pub fn session_strategy(&self) -> SessionStrategy {
        self.sessions.strategy()
    }

    /// Register a new user and open a session for them.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for empty fields or a malformed email
    /// - `Conflict` if the username or email is already registered
    /// - `Unavailable` if the graph store cannot be reached
    pub async fn signup(&self, input: SignupInput) -> Result<Authenticated, AccountError> {
        validate_signup_input(&input)?;

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            input.name.trim().to_string(),
            input.username.trim().to_string(),
            input.email.trim().to_string(),
            password_hash,
        );

        match self.gateway.insert_user(&user).await {
            Ok(()) => {}
            Err(GatewayError::ConstraintViolation(_)) => {
                tracing::warn!(username = %user.username, "signup rejected, username or email taken");
                return Err(AccountError::Conflict(
                    "username or email is already registered".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let session = self.sessions.issue(&user).await?;
        tracing::info!(username = %user.username, "user signed up");

        Ok(Authenticated {
            user: user.sanitized(),
            session,
        })
    }

    /// Log in by username or email.
    ///
    /// Credentials that already carry a valid session for the same user are
    /// accepted as-is. A missing user and a wrong password fail identically.
    pub async fn login(
        &self,
        input: LoginInput,
        existing: Option<&Credentials>,
    ) -> Result<Authenticated, AccountError> {
        if let Some(credentials) = existing {
            if let Ok(session) = self.sessions.validate(credentials).await {
                if let Some(user) = self.session_owner(&session).await? {
                    if user.matches_login(&input.login) {
                        tracing::debug!(username = %user.username, "login with an active session");
                        return Ok(Authenticated {
                            user: user.sanitized(),
                            session,
                        });
                    }
                }
            }
        }

        let user = match self.gateway.get_user(&input.login).await? {
            Some(user) => user,
            None => {
                if let Some(hash) = DUMMY_HASH.as_ref() {
                    let _ = verify_password(&input.password, hash);
                }
                tracing::warn!("login failed");
                return Err(AccountError::Unauthorized);
            }
        };

        if !verify_password(&input.password, &user.password_hash) {
            tracing::warn!("login failed");
            return Err(AccountError::Unauthorized);
        }

        let session = self.sessions.issue(&user).await?;
        tracing::info!(username = %user.username, "user logged in");

        Ok(Authenticated {
            user: user.sanitized(),
            session,
        })
    }

    /// Invalidate the session behind the credentials. Never fails.
    pub async fn logout(&self, credentials: Option<&Credentials>) {
        let Some(credentials) = credentials else {
            return;
        };
        if let Err(e) = self.sessions.revoke(credentials).await {
            tracing::debug!(error = %e, "logout with unusable credentials");
        }
    }

    /// Resolve the credentials of a request to the user they belong to.
    ///
    /// The returned user still carries its password hash; it is meant for
    /// server-side use and must be sanitized before it leaves the service.
    pub async fn authenticate(&self, credentials: Option<&Credentials>) -> Result<User, AccountError> {
        let credentials = credentials.ok_or(AccountError::Unauthorized)?;
        let session = self.sessions.validate(credentials).await.map_err(|e| {
            tracing::debug!(error = %e, "session rejected");
            AccountError::from(e)
        })?;

        self.session_owner(&session)
            .await?
            .ok_or(AccountError::Unauthorized)
    }

    /// Make `input.follower` follow `input.user`. The caller must be the follower.
    pub async fn follow(&self, caller: &User, input: FollowInput) -> Result<(), AccountError> {
        let (user, follower) = self.resolve_pair(caller, &input).await?;
        let (user, follower) = match (user, follower) {
            (Some(user), Some(follower)) => (user, follower),
            _ => return Err(AccountError::InvalidInput("unknown user".to_string())),
        };

        self.gateway.create_following(&user, &follower).await?;
        tracing::info!(user = %user.username, follower = %follower.username, "follow");
        Ok(())
    }

    /// Remove the follow edge if it exists. The caller must be the follower.
    pub async fn unfollow(&self, caller: &User, input: FollowInput) -> Result<(), AccountError> {
        let (user, follower) = self.resolve_pair(caller, &input).await?;
        let (Some(user), Some(follower)) = (user, follower) else {
            // Nothing to remove
            return Ok(());
        };

        self.gateway.unfollow(&user, &follower).await?;
        tracing::info!(user = %user.username, follower = %follower.username, "unfollow");
        Ok(())
    }

    /// Users following the named user
    pub async fn get_followers(&self, login: &str) -> Result<Vec<User>, AccountError> {
        let user = self.require_user(login).await?;
        let followers = self.gateway.get_followers(&user).await?;
        Ok(followers.into_iter().map(User::sanitized).collect())
    }

    /// Users the named user follows
    pub async fn get_following(&self, login: &str) -> Result<Vec<User>, AccountError> {
        let user = self.require_user(login).await?;
        let following = self.gateway.get_following(&user).await?;
        Ok(following.into_iter().map(User::sanitized).collect())
    }

    /// Look a user up by username or email
    pub async fn lookup(&self, login: &str) -> Result<Option<User>, AccountError> {
        Ok(self.gateway.get_user(login).await?.map(User::sanitized))
    }

    /// Detach-delete the caller's user node and end their session
    pub async fn delete_account(&self, caller: &User, credentials: &Credentials) -> Result<(), AccountError> {
        self.gateway.delete_user(&caller.username, &caller.email).await?;
        self.logout(Some(credentials)).await;
        tracing::info!(username = %caller.username, "account deleted");
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    /// The account a session was issued for, if it still exists. A user
    /// that has since taken over the username does not own the session.
    async fn session_owner(&self, session: &Session) -> Result<Option<User>, AccountError> {
        let user = self.gateway.get_user(&session.username).await?;
        Ok(user.filter(|user| {
            let owned = user.id == session.user_id;
            if !owned {
                tracing::warn!(username = %session.username, "session outlived its account");
            }
            owned
        }))
    }

    async fn resolve_pair(
        &self,
        caller: &User,
        input: &FollowInput,
    ) -> Result<(Option<User>, Option<User>), AccountError> {
        if input.user.trim().is_empty() || input.follower.trim().is_empty() {
            return Err(AccountError::InvalidInput(
                "user and follower are required".to_string(),
            ));
        }
        if !caller.matches_login(&input.follower) {
            tracing::warn!(caller = %caller.username, "follow change attempted on behalf of another user");
            return Err(AccountError::Unauthorized);
        }

        let user = self.gateway.get_user(&input.user).await?;
        let follower = self.gateway.get_user(&input.follower).await?;
        Ok((user, follower))
    }

    async fn require_user(&self, login: &str) -> Result<User, AccountError> {
        self.gateway
            .get_user(login)
            .await?
            .ok_or_else(|| AccountError::InvalidInput("unknown user".to_string()))
    }
}

fn validate_signup_input(input: &SignupInput) -> Result<(), AccountError> {
    if input.name.trim().is_empty() {
        return Err(AccountError::InvalidInput("name cannot be empty".to_string()));
    }
    let username = input.username.trim();
    if username.is_empty() {
        return Err(AccountError::InvalidInput("username cannot be empty".to_string()));
    }
    // Usernames travel in a cookie
    if username.len() > MAX_USERNAME_LENGTH
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(AccountError::InvalidInput(format!(
            "username must be at most {} letters, digits, '.', '_' or '-'",
            MAX_USERNAME_LENGTH
        )));
    }
    if input.password.is_empty() {
        return Err(AccountError::InvalidInput("password cannot be empty".to_string()));
    }
    if !validate_email(input.email.trim())? {
        return Err(AccountError::InvalidInput("invalid email address".to_string()));
    }
    Ok(())
}
