//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! SQLite allows one writer at a time. Transactions that write should issue their first write before any reads, so
//! that a competing writer waits for the lock (up to the busy timeout) instead of failing with `SQLITE_BUSY`.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

use crate::traits::StoreError;

pub mod checkout_sessions;
pub mod orders;
pub mod products;
pub mod refunds;

const SQLITE_DB_URL: &str = "sqlite://data/wick_lather.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("WL_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ WL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

/// Maps a unique constraint violation to the given error, and anything else to a database error.
pub(crate) fn on_unique_violation<F>(e: SqlxError, f: F) -> StoreError
where F: FnOnce() -> StoreError {
    match &e {
        SqlxError::Database(db_err) if db_err.is_unique_violation() => f(),
        _ => StoreError::from(e),
    }
}
