//! Listing nodes, SELLING and BOUGHT edges

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{new_edge_id, row_to_transaction, row_to_user, GatewayError};
use crate::db::queries;
use crate::models::{Listing, Price, Track, Transaction, User};

async fn insert_listing(conn: &mut SqliteConnection, listing: &Listing) -> Result<(), GatewayError> {
    sqlx::query(queries::INSERT_LISTING)
        .bind(&listing.id)
        .bind(listing.price.amount)
        .bind(&listing.price.currency)
        .bind(&listing.track.name)
        .bind(&listing.track.path)
        .bind(listing.created)
        .execute(conn)
        .await?;
    Ok(())
}

pub(super) async fn create_listing(pool: &SqlitePool, listing: &Listing) -> Result<(), GatewayError> {
    let mut conn = pool.acquire().await?;
    insert_listing(&mut *conn, listing).await?;

    tracing::debug!(listing_id = %listing.id, "listing node created");
    Ok(())
}

pub(super) async fn create_user_listing(
    pool: &SqlitePool,
    seller_id: Uuid,
    listing: &Listing,
) -> Result<(), GatewayError> {
    let mut tx = pool.begin().await?;

    let seller = sqlx::query(queries::USER_EXISTS)
        .bind(seller_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    if seller.is_none() {
        return Err(GatewayError::NotFound(format!("user {}", seller_id)));
    }

    insert_listing(&mut *tx, listing).await?;
    sqlx::query(queries::CREATE_SELLING)
        .bind(new_edge_id())
        .bind(seller_id.to_string())
        .bind(&listing.id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(listing_id = %listing.id, %seller_id, "listing node and SELLING edge created");
    Ok(())
}

pub(super) async fn mark_sold(
    pool: &SqlitePool,
    buyer: &User,
    listing_id: &str,
    date: DateTime<Utc>,
) -> Result<Transaction, GatewayError> {
    let mut tx = pool.begin().await?;

    let listing = sqlx::query(queries::LISTING_EXISTS)
        .bind(listing_id)
        .fetch_optional(&mut *tx)
        .await?;
    if listing.is_none() {
        return Err(GatewayError::NotFound(format!("listing {}", listing_id)));
    }
    let exists = sqlx::query(queries::USER_EXISTS)
        .bind(buyer.id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(GatewayError::NotFound(format!("user {}", buyer.id)));
    }

    let edge_id = new_edge_id();
    sqlx::query(queries::CREATE_BOUGHT)
        .bind(&edge_id)
        .bind(buyer.id.to_string())
        .bind(listing_id)
        .bind(date)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(%listing_id, buyer = %buyer.username, "BOUGHT edge created");
    Ok(Transaction {
        id: edge_id,
        buyer: buyer.clone().sanitized(),
        date,
    })
}

pub(super) async fn is_sold(pool: &SqlitePool, listing_id: &str) -> Result<Option<Transaction>, GatewayError> {
    let row = sqlx::query(queries::IS_SOLD)
        .bind(listing_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => row_to_transaction(&row),
        None => Ok(None),
    }
}

pub(super) async fn get_listing(pool: &SqlitePool, listing_id: &str) -> Result<Option<Listing>, GatewayError> {
    let row = sqlx::query(queries::GET_LISTING)
        .bind(listing_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_listing).transpose()
}

pub(super) async fn seller_of(pool: &SqlitePool, listing_id: &str) -> Result<Option<User>, GatewayError> {
    let row = sqlx::query(queries::GET_SELLER)
        .bind(listing_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub(super) async fn listings_for(pool: &SqlitePool, seller_id: Uuid) -> Result<Vec<Listing>, GatewayError> {
    let rows = sqlx::query(queries::LISTINGS_FOR_SELLER)
        .bind(seller_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_listing).collect()
}

fn row_to_listing(row: &SqliteRow) -> Result<Listing, GatewayError> {
    Ok(Listing {
        id: row.try_get("id")?,
        price: Price::new(row.try_get::<i64, _>("price_amount")?, row.try_get::<String, _>("price_currency")?),
        track: Track {
            name: row.try_get("track_name")?,
            path: row.try_get("track_path")?,
        },
        created: row.try_get("created_at")?,
        transaction: row_to_transaction(row)?,
    })
}
