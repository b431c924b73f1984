//! Where accepted price records go.

use crate::error::Result;
use async_trait::async_trait;
use lowball_core::PriceRecord;
use lowball_db::Database;

/// Durable, append-only sink for accepted records.
///
/// `append` may be called concurrently for independent records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist one record.
    async fn append(&self, record: &PriceRecord) -> Result<()>;
}

#[async_trait]
impl ResultStore for Database {
    async fn append(&self, record: &PriceRecord) -> Result<()> {
        Database::append(self, record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowball_core::{Currency, MarketplaceId, Price};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_database_store() {
        let db = Database::new(":memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        let store: Arc<dyn ResultStore> = Arc::new(db.clone());

        let record = PriceRecord::new(
            MarketplaceId::new("csdeals").unwrap(),
            "Glock-18 | Fade",
            Price::new(1020.0).unwrap(),
            Currency::Usd,
            "https://cs.deals/new/p2p?name=Glock-18",
        );
        store.append(&record).await.unwrap();

        let stored = db.list_recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record, record);
    }
}
