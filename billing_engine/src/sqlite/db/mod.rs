//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, kept as plain functions taking a `&mut SqliteConnection`. Callers can hand in a
//! pooled connection, or a transaction's connection when several statements need to land together.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod counters;
pub mod invoices;
pub mod payments;
pub mod registrations;
pub mod tickets;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/rbg_store.db";

pub fn db_url() -> String {
    let result = env::var("RBG_DATABASE_URL").unwrap_or_else(|_| {
        info!("RBG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
