//! Database connection pool
//!
//! The graph store lives in SQLite. Connections are pooled so unrelated
//! requests each check out their own connection instead of queueing behind a
//! single shared session.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DatabaseConfig;

/// Create a connection pool based on configuration.
///
/// Accepts either a `sqlite:` URL or a bare file path. For file-backed
/// databases the parent directory is created and the file is created on first
/// use.
///
/// # Errors
///
/// Returns an error if the URL is malformed or the connection cannot be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let url = normalize_url(&config.url);

    if !is_memory_url(&url) {
        let path = url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            }
        }
    }

    let mut options = SqliteConnectOptions::from_str(&url)
        .with_context(|| format!("Invalid database URL: {}", config.url))?
        .foreign_keys(true);
    if !is_memory_url(&url) {
        options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.timeout())
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to graph store: {}", config.url))?;

    tracing::debug!(url = %config.url, max_connections = config.max_connections, "graph store pool ready");
    Ok(pool)
}

/// Check if the graph store answers
pub async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Graph store ping failed")?;
    Ok(())
}

/// Create a SQLite in-memory pool for testing.
///
/// A single connection that is never recycled, so the in-memory database
/// lives as long as the pool.
pub async fn create_test_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to create in-memory graph store")?;
    Ok(pool)
}

fn normalize_url(url: &str) -> String {
    if url == ":memory:" {
        "sqlite::memory:".to_string()
    } else if url.starts_with("sqlite:") {
        url.to_string()
    } else {
        format!("sqlite:{}", url)
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
