//! Data models
//!
//! This module contains the data structures used throughout the service:
//! - Graph nodes (User, Listing)
//! - Read-side views over edges (Transaction)
//! - Session records and the credentials that carry them

mod listing;
mod session;
mod user;

pub use listing::{generate_listing_id, Listing, Price, Track, Transaction, LISTING_ID_LENGTH};
pub use session::{Credentials, Session};
pub use user::User;
