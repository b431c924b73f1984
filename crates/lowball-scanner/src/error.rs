use lowball_core::MarketplaceId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the scanner outside of a single page visit.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("item name must not be empty")]
    EmptyItemName,

    #[error("scrape request has no marketplace targets")]
    NoTargets,

    #[error("marketplace {0} is targeted more than once")]
    DuplicateMarketplace(MarketplaceId),

    #[error("max concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("unknown marketplace: {0}")]
    UnknownMarketplace(String),

    #[error("result store error: {0}")]
    Store(String),

    #[error("scrape job aborted: {0}")]
    JobAborted(String),

    #[error("Core error: {0}")]
    Core(#[from] lowball_core::LowballError),

    #[error("Browser error: {0}")]
    Browser(#[from] lowball_browser::BrowserError),

    #[error("Database error: {0}")]
    Database(#[from] lowball_db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Why a marketplace visit produced no price record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum ExtractionError {
    /// The page could not be opened, navigated, or was lost mid-attempt.
    #[error("could not open page: {0}")]
    AcquisitionError(String),

    /// The attempt deadline fired before any price candidate was found.
    #[error("no price found before the attempt deadline")]
    ExtractionTimeout,

    /// Price text was found but does not parse as a price.
    #[error("invalid price text: {0:?}")]
    InvalidPrice(String),

    /// The record was extracted but the store rejected it.
    #[error("failed to persist price record: {0}")]
    PersistenceError(String),

    /// The job was stopped.
    #[error("scrape job cancelled")]
    Cancelled,
}

impl ExtractionError {
    /// Transient errors are retried within the attempt budget.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AcquisitionError(_) | Self::ExtractionTimeout)
    }
}
