//! Append-only storage of accepted price observations.
//!
//! Each append is a single `INSERT`, so concurrent writers never race on a
//! read-modify-write cycle.

use crate::error::{DatabaseError, Result};
use lowball_core::{Currency, MarketplaceId, Price, PriceRecord, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

/// A price record together with its store-assigned row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPriceRecord {
    /// Row id
    pub id: i64,
    /// The stored record
    pub record: PriceRecord,
}

/// Append a record, returning its row id.
///
/// # Errors
/// Returns `DatabaseError::Validation` when a required text field is blank,
/// or a `SQLx` error if the insert fails.
pub async fn append(pool: &Pool<Sqlite>, record: &PriceRecord) -> Result<i64> {
    validate(record)?;

    let result = sqlx::query(
        "INSERT INTO price_records (marketplace_id, item_name, price, currency, source_url, observed_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(record.marketplace_id.as_str())
    .bind(&record.item_name)
    .bind(record.price.amount())
    .bind(record.currency.code())
    .bind(&record.source_url)
    .bind(record.observed_at.to_rfc3339())
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    tracing::debug!(
        id,
        marketplace = %record.marketplace_id,
        price = %record.price,
        "price record stored"
    );
    Ok(id)
}

fn validate(record: &PriceRecord) -> Result<()> {
    let required = [
        ("item_name", record.item_name.as_str()),
        ("source_url", record.source_url.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(DatabaseError::Validation(format!(
                "missing required field: {field}"
            )));
        }
    }
    Ok(())
}

/// Most recent records first.
pub async fn list_recent(pool: &Pool<Sqlite>, limit: u32) -> Result<Vec<StoredPriceRecord>> {
    let rows = sqlx::query(
        "SELECT id, marketplace_id, item_name, price, currency, source_url, observed_at
         FROM price_records ORDER BY observed_at DESC, id DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(decode_row).collect()
}

/// Cheapest stored record for an exact item name in one currency.
pub async fn lowest_for_item(
    pool: &Pool<Sqlite>,
    item_name: &str,
    currency: Currency,
) -> Result<Option<StoredPriceRecord>> {
    let row = sqlx::query(
        "SELECT id, marketplace_id, item_name, price, currency, source_url, observed_at
         FROM price_records WHERE item_name = ? AND currency = ?
         ORDER BY price ASC, observed_at DESC LIMIT 1",
    )
    .bind(item_name)
    .bind(currency.code())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(decode_row).transpose()
}

/// Total number of stored records.
pub async fn count(pool: &Pool<Sqlite>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM price_records")
        .fetch_one(pool)
        .await?)
}

fn decode_row(row: &SqliteRow) -> Result<StoredPriceRecord> {
    let marketplace: String = row.try_get("marketplace_id")?;
    let currency: String = row.try_get("currency")?;
    let observed_at: String = row.try_get("observed_at")?;
    let price: f64 = row.try_get("price")?;

    let decode = |e: lowball_core::LowballError| DatabaseError::Decode(e.to_string());

    Ok(StoredPriceRecord {
        id: row.try_get("id")?,
        record: PriceRecord {
            marketplace_id: MarketplaceId::new(marketplace).map_err(decode)?,
            item_name: row.try_get("item_name")?,
            price: Price::new(price).map_err(decode)?,
            currency: currency.parse().map_err(decode)?,
            source_url: row.try_get("source_url")?,
            observed_at: Timestamp::from_rfc3339(&observed_at).map_err(decode)?,
        },
    })
}
