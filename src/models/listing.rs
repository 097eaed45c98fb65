//! Listing model
//!
//! Listings are nodes linked to their seller by a SELLING edge and, once sold,
//! to their buyer by a BOUGHT edge carrying the purchase date.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::User;

/// Length of a generated listing id
pub const LISTING_ID_LENGTH: usize = 10;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are rejected so every character is equally likely.
const REJECTION_BOUND: u8 = (256 / ALPHANUMERIC.len() * ALPHANUMERIC.len()) as u8;

/// Currency amount in minor units (cents) with an ISO 4217 code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code
    pub currency: String,
}

impl Price {
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Check the amount is not negative and the currency looks like an ISO code
    pub fn is_valid(&self) -> bool {
        self.amount >= 0
            && self.currency.len() == 3
            && self.currency.chars().all(|c| c.is_ascii_uppercase())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02} {}",
            self.amount / 100,
            (self.amount % 100).abs(),
            self.currency
        )
    }
}

/// Track metadata attached to a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub path: String,
}

/// Completed sale, read from a BOUGHT edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Id of the BOUGHT edge
    pub id: String,
    /// Buyer, without password hash
    pub buyer: User,
    /// Purchase date
    pub date: DateTime<Utc>,
}

/// Listing node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Random fixed-length alphanumeric id
    pub id: String,
    pub price: Price,
    pub track: Track,
    /// Creation timestamp
    pub created: DateTime<Utc>,
    /// Present once the listing is sold
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction: Option<Transaction>,
}

impl Listing {
    /// Create an unsold listing with a freshly generated id
    pub fn new(price: Price, track: Track) -> Result<Self, getrandom::Error> {
        Ok(Self {
            id: generate_listing_id()?,
            price,
            track,
            created: Utc::now(),
            transaction: None,
        })
    }

    pub fn is_sold(&self) -> bool {
        self.transaction.is_some()
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{id: '{}', price: '{}', track: '{}'}}",
            self.id, self.price, self.track.name
        )
    }
}

/// Generate a random listing id of `LISTING_ID_LENGTH` alphanumeric characters
/// from the operating system's random source.
pub fn generate_listing_id() -> Result<String, getrandom::Error> {
    let mut id = String::with_capacity(LISTING_ID_LENGTH);
    let mut buf = [0u8; 32];

    while id.len() < LISTING_ID_LENGTH {
        getrandom::fill(&mut buf)?;
        for byte in buf.iter().copied().filter(|b| *b < REJECTION_BOUND) {
            if id.len() == LISTING_ID_LENGTH {
                break;
            }
            id.push(ALPHANUMERIC[byte as usize % ALPHANUMERIC.len()] as char);
        }
    }

    Ok(id)
}
