//! Database connection management.
//!
//! Builds the `SQLx` `SQLite` pool used by the result store. Writes from
//! concurrent scrape jobs are serialized by `SQLite` itself; WAL mode plus a
//! busy timeout keeps concurrent appends from failing with `SQLITE_BUSY`.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Maximum pooled connections.
const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits for the database lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) the `SQLite` database at `path`.
///
/// `:memory:` yields an in-memory database shared by all pooled connections.
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is not valid UTF-8, the
/// connection string is malformed, or the file cannot be opened.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path.as_ref().to_str().ok_or_else(|| {
        DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
    })?;

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    if path_str != ":memory:" {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to open {path_str}: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = connect(":memory:").await.expect("create pool");
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("run query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_file_pool_created() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let path = tmp.path().join("prices.db");
        let pool = connect(&path).await.expect("create file pool");
        pool.close().await;
        assert!(path.exists());
    }
}
