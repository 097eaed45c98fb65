//! Database migrations module
//!
//! The graph is stored as two node tables (`users`, `listings`) and a single
//! `edges` table holding FOLLOWS, SELLING and BOUGHT relationships. Migrations
//! are embedded in the binary as SQL strings and applied in version order.
//!
//! # Usage
//!
//! ```ignore
//! use musicmatch::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::SqlitePool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                username VARCHAR(64) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_listings",
        up: r#"
            CREATE TABLE IF NOT EXISTS listings (
                id VARCHAR(16) PRIMARY KEY,
                price_amount INTEGER NOT NULL CHECK (price_amount >= 0),
                price_currency CHAR(3) NOT NULL,
                track_name VARCHAR(255) NOT NULL,
                track_path VARCHAR(1024) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 3,
        name: "create_edges",
        up: r#"
            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                kind VARCHAR(16) NOT NULL CHECK (kind IN ('FOLLOWS', 'SELLING', 'BOUGHT')),
                src TEXT NOT NULL,
                dst TEXT NOT NULL,
                date TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (kind, src, dst)
            );
            -- Reverse lookups (followers of a user, buyer of a listing)
            CREATE INDEX IF NOT EXISTS idx_edges_dst_kind ON edges(dst, kind);
            -- A listing has one seller and is sold at most once
            CREATE UNIQUE INDEX IF NOT EXISTS idx_edges_single_seller ON edges(dst) WHERE kind = 'SELLING';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_edges_single_sale ON edges(dst) WHERE kind = 'BOUGHT';
        "#,
    },
];

/// Run all pending migrations.
///
/// # Returns
///
/// Number of migrations applied
///
/// # Errors
///
/// Returns an error if any migration fails to apply
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied_versions = get_applied_versions(pool).await?;

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create migrations table")?;
    Ok(())
}

async fn get_applied_versions(pool: &SqlitePool) -> Result<Vec<i32>> {
    let versions = sqlx::query_scalar::<_, i32>("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;
    Ok(versions)
}

/// Apply a single migration and record it, all in one transaction
async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        let mut end = 100;
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &sql[..end])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of embedded migrations not yet applied
pub async fn pending_count(pool: &SqlitePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}
