//! The per-job result map.

use crate::error::ExtractionError;
use lowball_core::{Currency, MarketplaceId, PriceRecord};
use serde::Serialize;

/// Final state of one marketplace within a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceEntry {
    /// Marketplace visited
    pub marketplace_id: MarketplaceId,
    /// Page visited
    pub url: String,
    /// Extraction attempts started
    pub attempts: u32,
    /// Accepted record or the extraction failure
    #[serde(with = "entry_result")]
    pub result: Result<PriceRecord, ExtractionError>,
    /// Store failure for an accepted record, if the append failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_error: Option<String>,
}

/// Outcomes of every marketplace in a job, in reporting order.
///
/// Only the job's aggregator writes to it; once every marketplace has
/// reported it is handed out read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    total_count: usize,
    entries: Vec<MarketplaceEntry>,
}

impl JobOutcome {
    pub(crate) fn new(total_count: usize) -> Self {
        Self {
            total_count,
            entries: Vec::with_capacity(total_count),
        }
    }

    /// Record an entry. Returns `false`, leaving the map untouched, when the
    /// marketplace already reported or the outcome is complete.
    pub(crate) fn insert(&mut self, entry: MarketplaceEntry) -> bool {
        if self.is_complete() || self.contains(&entry.marketplace_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    #[must_use]
    pub fn contains(&self, id: &MarketplaceId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: &MarketplaceId) -> Option<&MarketplaceEntry> {
        self.entries.iter().find(|e| &e.marketplace_id == id)
    }

    /// Marketplaces that have reported.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.entries.len()
    }

    /// Marketplaces in the job.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entries.len() >= self.total_count
    }

    #[must_use]
    pub fn entries(&self) -> &[MarketplaceEntry] {
        &self.entries
    }

    /// Accepted records, whether or not they were persisted.
    #[must_use]
    pub fn records(&self) -> Vec<&PriceRecord> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().ok())
            .collect()
    }

    /// Marketplaces that produced no record, with the reason.
    #[must_use]
    pub fn failures(&self) -> Vec<(&MarketplaceId, &ExtractionError)> {
        self.entries
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (&e.marketplace_id, err)))
            .collect()
    }

    /// Attempts used by a marketplace.
    #[must_use]
    pub fn attempts(&self, id: &MarketplaceId) -> Option<u32> {
        self.get(id).map(|e| e.attempts)
    }

    /// Cheapest accepted record in `currency`.
    ///
    /// Prices in different currencies are never compared.
    #[must_use]
    pub fn best_offer(&self, currency: Currency) -> Option<&PriceRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.currency == currency)
            .min_by(|a, b| a.price.amount().total_cmp(&b.price.amount()))
    }
}

mod entry_result {
    use super::{ExtractionError, PriceRecord};
    use serde::{Serialize, Serializer};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    enum Wire<'a> {
        Record(&'a PriceRecord),
        Error(&'a ExtractionError),
    }

    pub fn serialize<S: Serializer>(
        value: &Result<PriceRecord, ExtractionError>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Ok(record) => Wire::Record(record).serialize(serializer),
            Err(e) => Wire::Error(e).serialize(serializer),
        }
    }
}
