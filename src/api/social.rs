//! Social graph API endpoints
//!
//! - POST /api/v1/follow - `{user, follower}`, caller must be the follower
//! - POST /api/v1/unfollow - `{user, follower}`, caller must be the follower
//! - GET /api/v1/users/{username}/followers
//! - GET /api/v1/users/{username}/following

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::auth::UserResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonBody};
use crate::services::FollowInput;

/// Build public social routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/users/{username}/followers", get(followers))
        .route("/users/{username}/following", get(following))
}

/// Build protected social routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/follow", post(follow))
        .route("/unfollow", post(unfollow))
}

/// POST /api/v1/follow
async fn follow(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    JsonBody(body): JsonBody<FollowInput>,
) -> Result<StatusCode, ApiError> {
    state.accounts.follow(&auth.user, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/unfollow
async fn unfollow(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    JsonBody(body): JsonBody<FollowInput>,
) -> Result<StatusCode, ApiError> {
    state.accounts.unfollow(&auth.user, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/{username}/followers
async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.accounts.get_followers(&username).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// GET /api/v1/users/{username}/following
async fn following(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.accounts.get_following(&username).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
