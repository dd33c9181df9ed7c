//! Persistence: the run store (scan results) and the live store (ingested
//! bets), each backed by its own SQLite file in WAL mode. Schema evolution
//! is additive only; `CREATE TABLE IF NOT EXISTS` plus idempotent
//! `ALTER TABLE ... ADD COLUMN` (ignoring the duplicate-column error) let
//! repeated startup stay safe.

mod live_store;
mod run_store;

pub use live_store::{LiveBet, LiveStore, LiveStream, Order};
pub use run_store::{HitRow, HitsPage, NewRun, RunFilter, RunRecord, RunStore};

use crate::error::{ReplayError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// A single page of results, shared shape across run and live listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

pub(crate) async fn open(path: &Path, max_connections: u32) -> Result<SqlitePool> {
    let url = format!("sqlite://{}", path.display());
    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|e| ReplayError::system("IO_ERROR", "invalid database path").with_cause(e))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| ReplayError::system("DB_CONNECT_FAILED", "failed to open database").with_cause(e))
}

pub(crate) fn clamp_page(page: u32) -> u32 {
    page.max(1)
}

pub(crate) fn total_pages(total_count: u64, per_page: u32) -> u32 {
    if total_count == 0 {
        return 0;
    }
    ((total_count + per_page as u64 - 1) / per_page as u64) as u32
}
