//! API layer - HTTP handlers and routing
//!
//! This module contains the HTTP API endpoints for the MusicMatch service.
//! It includes:
//! - Auth endpoints (signup, login, logout)
//! - User endpoints (lookup, account deletion)
//! - Social graph endpoints (follow, unfollow, followers, following)
//! - Listing endpoints (create, buy, sale status)

pub mod auth;
pub mod listings;
pub mod middleware;
pub mod social;

use axum::{middleware as axum_middleware, Router};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Protected routes (need a valid session)
    let protected_routes = Router::new()
        .nest("/users", auth::protected_router())
        .merge(social::protected_router())
        .merge(listings::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(social::public_router())
        .merge(listings::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
