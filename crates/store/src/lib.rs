//! PostgreSQL persistence layer for the coffee shop service.
//!
//! Query modules are organized per table family. Multi-statement write
//! operations take `&mut PgConnection` so callers can compose them inside
//! a single transaction; single-statement operations accept any
//! `PgExecutor` (a pool reference or an open transaction).

pub mod customers;
mod error;
pub mod inventory;
pub mod menu;
pub mod orders;

pub use error::{Result, StoreError};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connects to PostgreSQL with a bounded connection pool.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Runs the database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
