//! Database layer
//!
//! The graph store is realised on SQLite: node tables for users and listings
//! and a single labelled edge table. Everything above this layer talks to it
//! through the `GraphGateway` capability interface.
//!
//! # Usage
//!
//! ```ignore
//! use musicmatch::db::{create_pool, migrations, SqlxGraphGateway};
//!
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! let gateway = SqlxGraphGateway::boxed(pool, config.database.timeout());
//! ```

pub mod gateway;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use gateway::{GatewayError, GraphGateway, SqlxGraphGateway};
pub use pool::{create_pool, create_test_pool, ping};
