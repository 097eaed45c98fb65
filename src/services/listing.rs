//! Listing service
//!
//! Selling and buying tracks: a listing is created together with its SELLING
//! edge and sold at most once through a dated BOUGHT edge.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{GatewayError, GraphGateway};
use crate::models::{Listing, Price, Track, Transaction, User};

/// Error types for listing operations
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    /// Bad price or track metadata
    #[error("Invalid listing: {0}")]
    InvalidInput(String),

    #[error("Listing not found")]
    UnknownListing,

    #[error("User not found")]
    UnknownUser,

    #[error("Sellers cannot buy their own listing")]
    OwnListing,

    #[error("Listing has already been sold")]
    AlreadySold,

    /// The graph store is unreachable or the transaction failed
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GatewayError> for ListingError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ConstraintViolation(msg) => ListingError::Internal(msg),
            GatewayError::NotFound(what) if what.starts_with("listing") => ListingError::UnknownListing,
            GatewayError::NotFound(_) => ListingError::UnknownUser,
            GatewayError::Timeout(_) | GatewayError::Store(_) => {
                ListingError::Unavailable("graph store unavailable".to_string())
            }
            GatewayError::Corrupt(msg) => ListingError::Internal(msg),
        }
    }
}

/// Input for creating a listing
#[derive(Debug, Clone, Deserialize)]
pub struct CreateListingInput {
    pub price: Price,
    pub track: Track,
}

/// Listing service
pub struct ListingService {
    gateway: Arc<dyn GraphGateway>,
}

impl ListingService {
    pub fn new(gateway: Arc<dyn GraphGateway>) -> Self {
        Self { gateway }
    }

    /// Put a track up for sale by `seller`
    pub async fn create_listing(&self, seller: &User, input: CreateListingInput) -> Result<Listing, ListingError> {
        if !input.price.is_valid() {
            return Err(ListingError::InvalidInput(
                "price needs a non-negative amount and a three-letter currency code".to_string(),
            ));
        }
        if input.track.name.trim().is_empty() || input.track.path.trim().is_empty() {
            return Err(ListingError::InvalidInput(
                "track name and path are required".to_string(),
            ));
        }

        let listing = Listing::new(input.price, input.track).map_err(|e| {
            tracing::error!(error = %e, "failed to generate listing id");
            ListingError::Internal("failed to generate listing id".to_string())
        })?;

        self.gateway.create_user_listing(seller, &listing).await?;
        tracing::info!(listing_id = %listing.id, seller = %seller.username, "listing created");

        Ok(listing)
    }

    /// Buy a listing. A listing is sold once; sellers cannot buy their own.
    pub async fn buy_listing(&self, buyer: &User, listing_id: &str) -> Result<Transaction, ListingError> {
        let seller = self
            .gateway
            .seller_of(listing_id)
            .await?
            .ok_or(ListingError::UnknownListing)?;
        if seller.id == buyer.id {
            return Err(ListingError::OwnListing);
        }
        if self.gateway.is_sold(listing_id).await?.is_some() {
            return Err(ListingError::AlreadySold);
        }

        match self.gateway.mark_sold(buyer, listing_id, Utc::now()).await {
            Ok(transaction) => {
                tracing::info!(%listing_id, buyer = %buyer.username, "listing sold");
                Ok(transaction)
            }
            // Lost a race with another buyer
            Err(GatewayError::ConstraintViolation(_)) => Err(ListingError::AlreadySold),
            Err(e) => Err(e.into()),
        }
    }

    /// A listing with its sale, if sold
    pub async fn get_listing(&self, listing_id: &str) -> Result<Listing, ListingError> {
        self.gateway
            .get_listing(listing_id)
            .await?
            .ok_or(ListingError::UnknownListing)
    }

    /// The sale of a listing, `None` while it is unsold
    pub async fn sale_status(&self, listing_id: &str) -> Result<Option<Transaction>, ListingError> {
        if self.gateway.get_listing(listing_id).await?.is_none() {
            return Err(ListingError::UnknownListing);
        }
        Ok(self.gateway.is_sold(listing_id).await?)
    }

    /// Everything the named user is selling
    pub async fn listings_for(&self, login: &str) -> Result<Vec<Listing>, ListingError> {
        let seller = self
            .gateway
            .get_user(login)
            .await?
            .ok_or(ListingError::UnknownUser)?;

        Ok(self.gateway.listings_for(&seller).await?)
    }
}
