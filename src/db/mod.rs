//! SQLite persistence. Every repository function takes a plain
//! `&mut SqliteConnection` so that services can run several of them inside
//! one transaction (`&mut tx`) or on a pooled connection (`&mut conn`).
//! Nothing here calls back into the domain services.

pub mod academic_years;
pub mod availabilities;
pub mod quotas;
pub mod rooms;
pub mod runs;
pub mod sessions;
pub mod subjects;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{info, warn};

use crate::error::AppError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Attempts made for a transaction hitting a busy/locked database.
pub const MAX_TX_ATTEMPTS: u32 = 5;

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    info!("database ready at {}", database_url);
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied. The pool
/// never recycles its connection, otherwise the data would vanish.
pub async fn connect_in_memory() -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

/// Linear backoff before replaying a transaction.
pub async fn backoff(attempt: u32, err: &AppError) {
    warn!("transient database error (attempt {}): {}", attempt, err);
    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
}
