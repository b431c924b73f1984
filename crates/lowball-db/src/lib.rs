//! Lowball Database Layer
//!
//! Durable, append-only store for accepted price records, backed by `SQLite`
//! through `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use lowball_db::Database;
//!
//! let db = Database::new("prices.db").await?;
//! db.run_migrations().await?;
//! db.append(&record).await?;
//! let recent = db.list_recent(50).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod price_records;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use price_records::StoredPriceRecord;

use lowball_core::{Currency, PriceRecord};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level handle to the result store.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database at `path` (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::connect(path).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Append one accepted price record.
    pub async fn append(&self, record: &PriceRecord) -> Result<i64> {
        price_records::append(&self.pool, record).await
    }

    /// Most recent records first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<StoredPriceRecord>> {
        price_records::list_recent(&self.pool, limit).await
    }

    /// Total number of stored records.
    pub async fn count(&self) -> Result<i64> {
        price_records::count(&self.pool).await
    }

    /// Cheapest stored record for an item in one currency.
    pub async fn lowest_for_item(
        &self,
        item_name: &str,
        currency: Currency,
    ) -> Result<Option<StoredPriceRecord>> {
        price_records::lowest_for_item(&self.pool, item_name, currency).await
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
