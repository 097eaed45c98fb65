//! Listing API endpoints
//!
//! - POST /api/v1/listings - create a listing (auth)
//! - GET /api/v1/listings/{id} - a listing with its sale
//! - GET /api/v1/listings/{id}/sale - sale status
//! - POST /api/v1/listings/{id}/buy - buy a listing (auth)
//! - GET /api/v1/users/{username}/listings - a seller's listings

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, JsonBody};
use crate::models::{Listing, Transaction};
use crate::services::CreateListingInput;

/// Sale status of a listing
#[derive(Debug, Serialize)]
pub struct SaleStatusResponse {
    pub sold: bool,
    pub transaction: Option<Transaction>,
}

/// Build public listing routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/listings/{id}", get(get_listing))
        .route("/listings/{id}/sale", get(sale_status))
        .route("/users/{username}/listings", get(listings_for))
}

/// Build protected listing routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/listings", post(create_listing))
        .route("/listings/{id}/buy", post(buy_listing))
}

/// POST /api/v1/listings
async fn create_listing(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    JsonBody(body): JsonBody<CreateListingInput>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.listings.create_listing(&auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// GET /api/v1/listings/{id}
async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    Ok(Json(state.listings.get_listing(&id).await?))
}

/// GET /api/v1/listings/{id}/sale
async fn sale_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleStatusResponse>, ApiError> {
    let transaction = state.listings.sale_status(&id).await?;
    Ok(Json(SaleStatusResponse {
        sold: transaction.is_some(),
        transaction,
    }))
}

/// POST /api/v1/listings/{id}/buy
async fn buy_listing(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction = state.listings.buy_listing(&auth.user, &id).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// GET /api/v1/users/{username}/listings
async fn listings_for(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    Ok(Json(state.listings.listings_for(&username).await?))
}
