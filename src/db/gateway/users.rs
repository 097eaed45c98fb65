//! User nodes and FOLLOWS edges

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{new_edge_id, row_to_user, GatewayError};
use crate::db::queries;
use crate::models::User;

pub(super) async fn get_user(pool: &SqlitePool, identifier: &str) -> Result<Option<User>, GatewayError> {
    let row = sqlx::query(queries::GET_USER_BY_LOGIN)
        .bind(identifier)
        .bind(identifier)
        .bind(identifier)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_user).transpose()
}

pub(super) async fn insert_user(pool: &SqlitePool, user: &User) -> Result<(), GatewayError> {
    sqlx::query(queries::INSERT_USER)
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(pool)
        .await?;

    tracing::debug!(username = %user.username, "user node created");
    Ok(())
}

pub(super) async fn create_following(
    pool: &SqlitePool,
    user_id: Uuid,
    follower_id: Uuid,
) -> Result<(), GatewayError> {
    let mut tx = pool.begin().await?;

    for id in [user_id, follower_id] {
        let exists = sqlx::query(queries::USER_EXISTS)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(GatewayError::NotFound(format!("user {}", id)));
        }
    }

    let result = sqlx::query(queries::CREATE_FOLLOWING)
        .bind(new_edge_id())
        .bind(follower_id.to_string())
        .bind(user_id.to_string())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if result.rows_affected() == 0 {
        tracing::debug!(%user_id, %follower_id, "follow edge already present");
    }
    Ok(())
}

pub(super) async fn unfollow(pool: &SqlitePool, user_id: Uuid, follower_id: Uuid) -> Result<(), GatewayError> {
    let result = sqlx::query(queries::DELETE_FOLLOWING)
        .bind(follower_id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    tracing::debug!(%user_id, %follower_id, removed = result.rows_affected(), "unfollow");
    Ok(())
}

pub(super) async fn get_followers(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<User>, GatewayError> {
    let rows = sqlx::query(queries::GET_FOLLOWERS)
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_user).collect()
}

pub(super) async fn get_following(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<User>, GatewayError> {
    let rows = sqlx::query(queries::GET_FOLLOWING)
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_user).collect()
}

pub(super) async fn delete_user(pool: &SqlitePool, username: &str, email: &str) -> Result<(), GatewayError> {
    let mut tx = pool.begin().await?;

    let id: Option<String> = sqlx::query_scalar(queries::FIND_USER_ID)
        .bind(username)
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;
    let id = id.ok_or_else(|| GatewayError::NotFound(format!("user {}", username)))?;

    let edges = sqlx::query(queries::DETACH_EDGES)
        .bind(&id)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(queries::DELETE_USER)
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::debug!(%username, edges = edges.rows_affected(), "user node detach-deleted");
    Ok(())
}
