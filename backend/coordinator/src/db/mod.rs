//! Database layer — connection pool, migrations, and the donation and
//! acceptance stores.
//!
//! Store functions take either the pool or an open transaction
//! (`&mut SqliteConnection`), so the lifecycle engine can group several
//! writes into one atomic unit of work.

pub mod acceptances;
pub mod donations;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::Result;

/// How long a writer waits for SQLite's write lock before giving up.
const BUSY_TIMEOUT_SECS: u64 = 10;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    /// A migrated pool backed by a throwaway database file.
    ///
    /// The [`TempDir`] must outlive the pool.
    pub async fn test_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("coordinator.db");
        let pool = super::init_pool(&path.display().to_string(), 8)
            .await
            .expect("init pool");
        (dir, pool)
    }
}
