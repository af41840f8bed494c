//! # Database Persistence Layer
//!
//! Optional Postgres write-through for the in-memory store. The store stays
//! authoritative while the process runs; the database lets state survive a
//! restart and holds the tamper-evident audit chain.
//!
//! When `DATABASE_URL` is not set the service runs in-memory only. Schema
//! migrations are applied outside this crate.

pub mod audit;
pub mod requests;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres if `DATABASE_URL` is set.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!("DATABASE_URL not set, running with in-memory state only");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to database");
    Ok(Some(pool))
}

/// Postgres has no unsigned integers; ids and versions are stored as BIGINT.
pub(crate) fn to_i64(value: u64) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

pub(crate) fn from_i64(value: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
