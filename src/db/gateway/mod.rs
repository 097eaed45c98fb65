//! Graph persistence gateway
//!
//! Translates domain operations on users, follow edges and listings into
//! parameterized transactions against the graph store, and maps rows back
//! into domain entities.
//!
//! This module provides:
//! - `GraphGateway` trait, the capability interface the orchestrators depend on
//! - `SqlxGraphGateway` implementing it over the SQLite node/edge schema
//!
//! Every call is bounded by the configured store timeout. Multi-step writes
//! run in a single transaction, so a failure partway leaves nothing behind.

mod listings;
mod users;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Listing, Transaction, User};

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A uniqueness or check constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A node the operation depends on does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Graph store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store is unreachable or the transaction failed
    #[error("Graph store error: {0}")]
    Store(#[source] sqlx::Error),

    /// A stored record could not be mapped back to a domain entity
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() || db_err.is_check_violation() {
                return GatewayError::ConstraintViolation(db_err.message().to_string());
            }
        }
        match err {
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => GatewayError::Corrupt(err.to_string()),
            other => GatewayError::Store(other),
        }
    }
}

/// Graph persistence capability interface
#[async_trait]
pub trait GraphGateway: Send + Sync {
    /// Look up a user by username or email; `None` when nothing matches
    async fn get_user(&self, identifier: &str) -> Result<Option<User>, GatewayError>;

    /// Persist a new user node; duplicates fail with `ConstraintViolation`
    async fn insert_user(&self, user: &User) -> Result<(), GatewayError>;

    /// Create `follower -FOLLOWS-> user`. Repeating it keeps a single edge.
    async fn create_following(&self, user: &User, follower: &User) -> Result<(), GatewayError>;

    /// Remove `follower -FOLLOWS-> user`; succeeds when no edge exists
    async fn unfollow(&self, user: &User, follower: &User) -> Result<(), GatewayError>;

    /// All users with a FOLLOWS edge into `user`
    async fn get_followers(&self, user: &User) -> Result<Vec<User>, GatewayError>;

    /// All users `user` follows
    async fn get_following(&self, user: &User) -> Result<Vec<User>, GatewayError>;

    /// Detach-delete the user matching both fields along with every incident edge
    async fn delete_user(&self, username: &str, email: &str) -> Result<(), GatewayError>;

    /// Persist a listing node without a seller
    async fn create_listing(&self, listing: &Listing) -> Result<(), GatewayError>;

    /// Persist a listing node and its SELLING edge atomically
    async fn create_user_listing(&self, seller: &User, listing: &Listing) -> Result<(), GatewayError>;

    /// Link `buyer` to the listing with a dated BOUGHT edge
    async fn mark_sold(
        &self,
        buyer: &User,
        listing_id: &str,
        date: DateTime<Utc>,
    ) -> Result<Transaction, GatewayError>;

    /// The sale of a listing, if it has been sold
    async fn is_sold(&self, listing_id: &str) -> Result<Option<Transaction>, GatewayError>;

    /// A listing with its sale, if any
    async fn get_listing(&self, listing_id: &str) -> Result<Option<Listing>, GatewayError>;

    /// The seller of a listing
    async fn seller_of(&self, listing_id: &str) -> Result<Option<User>, GatewayError>;

    /// Every listing `seller` is selling, newest first
    async fn listings_for(&self, seller: &User) -> Result<Vec<Listing>, GatewayError>;
}

/// SQLx-based gateway over the SQLite node/edge schema
pub struct SqlxGraphGateway {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqlxGraphGateway {
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Create a boxed gateway for use with dependency injection
    pub fn boxed(pool: SqlitePool, timeout: Duration) -> Arc<dyn GraphGateway> {
        Arc::new(Self::new(pool, timeout))
    }

    /// Run a store call under the configured timeout
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                match &err {
                    GatewayError::Store(e) => tracing::error!(op, error = %e, "graph store call failed"),
                    GatewayError::Corrupt(msg) => tracing::error!(op, %msg, "corrupt graph record"),
                    _ => tracing::debug!(op, error = %err, "graph store call rejected"),
                }
                Err(err)
            }
            Err(_) => {
                tracing::error!(op, timeout = ?self.timeout, "graph store call timed out");
                Err(GatewayError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl GraphGateway for SqlxGraphGateway {
    async fn get_user(&self, identifier: &str) -> Result<Option<User>, GatewayError> {
        self.bounded("get_user", users::get_user(&self.pool, identifier)).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), GatewayError> {
        self.bounded("insert_user", users::insert_user(&self.pool, user)).await
    }

    async fn create_following(&self, user: &User, follower: &User) -> Result<(), GatewayError> {
        self.bounded(
            "create_following",
            users::create_following(&self.pool, user.id, follower.id),
        )
        .await
    }

    async fn unfollow(&self, user: &User, follower: &User) -> Result<(), GatewayError> {
        self.bounded("unfollow", users::unfollow(&self.pool, user.id, follower.id))
            .await
    }

    async fn get_followers(&self, user: &User) -> Result<Vec<User>, GatewayError> {
        self.bounded("get_followers", users::get_followers(&self.pool, user.id))
            .await
    }

    async fn get_following(&self, user: &User) -> Result<Vec<User>, GatewayError> {
        self.bounded("get_following", users::get_following(&self.pool, user.id))
            .await
    }

    async fn delete_user(&self, username: &str, email: &str) -> Result<(), GatewayError> {
        self.bounded("delete_user", users::delete_user(&self.pool, username, email))
            .await
    }

    async fn create_listing(&self, listing: &Listing) -> Result<(), GatewayError> {
        self.bounded("create_listing", listings::create_listing(&self.pool, listing))
            .await
    }

    async fn create_user_listing(&self, seller: &User, listing: &Listing) -> Result<(), GatewayError> {
        self.bounded(
            "create_user_listing",
            listings::create_user_listing(&self.pool, seller.id, listing),
        )
        .await
    }

    async fn mark_sold(
        &self,
        buyer: &User,
        listing_id: &str,
        date: DateTime<Utc>,
    ) -> Result<Transaction, GatewayError> {
        self.bounded(
            "mark_sold",
            listings::mark_sold(&self.pool, buyer, listing_id, date),
        )
        .await
    }

    async fn is_sold(&self, listing_id: &str) -> Result<Option<Transaction>, GatewayError> {
        self.bounded("is_sold", listings::is_sold(&self.pool, listing_id))
            .await
    }

    async fn get_listing(&self, listing_id: &str) -> Result<Option<Listing>, GatewayError> {
        self.bounded("get_listing", listings::get_listing(&self.pool, listing_id))
            .await
    }

    async fn seller_of(&self, listing_id: &str) -> Result<Option<User>, GatewayError> {
        self.bounded("seller_of", listings::seller_of(&self.pool, listing_id))
            .await
    }

    async fn listings_for(&self, seller: &User) -> Result<Vec<Listing>, GatewayError> {
        self.bounded("listings_for", listings::listings_for(&self.pool, seller.id))
            .await
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn parse_id(raw: &str) -> Result<Uuid, GatewayError> {
    Uuid::parse_str(raw).map_err(|e| GatewayError::Corrupt(format!("invalid user id '{}': {}", raw, e)))
}

fn row_to_user(row: &SqliteRow) -> Result<User, GatewayError> {
    let id: String = row.try_get("id")?;
    Ok(User {
        id: parse_id(&id)?,
        name: row.try_get("name")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Map the `sale_*`/`buyer_*` columns of a listing read. The buyer is
/// returned without its password hash.
fn row_to_transaction(row: &SqliteRow) -> Result<Option<Transaction>, GatewayError> {
    let sale_id: Option<String> = row.try_get("sale_id")?;
    let Some(sale_id) = sale_id else {
        return Ok(None);
    };

    let buyer_id: Option<String> = row.try_get("buyer_id")?;
    let buyer_id = buyer_id
        .ok_or_else(|| GatewayError::Corrupt(format!("sale {} has no buyer", sale_id)))?;
    let date: Option<DateTime<Utc>> = row.try_get("sale_date")?;
    let date = date.ok_or_else(|| GatewayError::Corrupt(format!("sale {} has no date", sale_id)))?;

    Ok(Some(Transaction {
        id: sale_id,
        buyer: User {
            id: parse_id(&buyer_id)?,
            name: row.try_get("buyer_name")?,
            username: row.try_get("buyer_username")?,
            email: row.try_get("buyer_email")?,
            password_hash: String::new(),
            created_at: row.try_get("buyer_created_at")?,
        },
        date,
    }))
}

fn new_edge_id() -> String {
    Uuid::new_v4().to_string()
}
