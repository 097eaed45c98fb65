//! Authentication API endpoints
//!
//! Handles HTTP requests for accounts:
//! - POST /api/v1/auth/signup - Create an account and open a session
//! - POST /api/v1/auth/login - Log in by username or email
//! - POST /api/v1/auth/logout - End the current session
//! - POST /api/v1/users/lookup - Find a user by username or email
//! - DELETE /api/v1/users/me - Delete the caller's account

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::{
    extract_credentials, ApiError, AppState, AuthenticatedUser, JsonBody, TOKEN_COOKIE,
    USERNAME_COOKIE,
};
use crate::config::SessionStrategy;
use crate::models::{Session, User};
use crate::services::{LoginInput, SignupInput};

/// Request body for a user lookup
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub login: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Public view of a user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Response for a user lookup; `user` is null when nobody matches
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub user: Option<UserResponse>,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// Build protected user routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/lookup", post(lookup))
        .route("/me", delete(delete_me))
}

/// Set-Cookie headers for both halves of the session. Signed tokens travel
/// as bearer tokens, so they get no cookies.
fn session_cookies(strategy: SessionStrategy, session: &Session) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    if strategy != SessionStrategy::Opaque {
        return Ok(headers);
    }
    for (name, value) in [
        (USERNAME_COOKIE, session.username.as_str()),
        (TOKEN_COOKIE, session.token.as_str()),
    ] {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, value);
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie value: {}", e)))?;
        headers.append(header::SET_COOKIE, value);
    }
    Ok(headers)
}

fn clear_session_cookies() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_static("username=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    headers.append(
        header::SET_COOKIE,
        HeaderValue::from_static("token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    headers
}

/// POST /api/v1/auth/signup - Account creation
async fn signup(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SignupInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.accounts.signup(body).await?;
    let headers = session_cookies(state.accounts.session_strategy(), &outcome.session)?;

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: outcome.user.into(),
            token: outcome.session.token,
            expires_at: outcome.session.expires_at,
        }),
    ))
}

/// POST /api/v1/auth/login - User login
///
/// A request already carrying a valid session for the same user is answered
/// with that session.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = extract_credentials(&headers);
    let outcome = state.accounts.login(body, existing.as_ref()).await?;
    let response_headers = session_cookies(state.accounts.session_strategy(), &outcome.session)?;

    Ok((
        response_headers,
        Json(AuthResponse {
            user: outcome.user.into(),
            token: outcome.session.token,
            expires_at: outcome.session.expires_at,
        }),
    ))
}

/// POST /api/v1/auth/logout - User logout
///
/// Always succeeds and clears the session cookies.
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let credentials = extract_credentials(&headers);
    state.accounts.logout(credentials.as_ref()).await;

    (StatusCode::NO_CONTENT, clear_session_cookies())
}

/// POST /api/v1/users/lookup - Find a user by username or email
async fn lookup(
    State(state): State<AppState>,
    _auth: AuthenticatedUser,
    JsonBody(body): JsonBody<LookupRequest>,
) -> Result<Json<LookupResponse>, ApiError> {
    let user = state.accounts.lookup(&body.login).await?;
    Ok(Json(LookupResponse {
        user: user.map(UserResponse::from),
    }))
}

/// DELETE /api/v1/users/me - Delete the caller's account
async fn delete_me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .delete_account(&auth.user, &auth.credentials)
        .await?;

    Ok((StatusCode::NO_CONTENT, clear_session_cookies()))
}
