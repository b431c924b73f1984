//! Lowball Scanner - scrape-job orchestration.
//!
//! Takes one request ("lowest price of item X in wear W") and visits every
//! target marketplace in a browser page, extracting a price with
//! marketplace-specific selectors and a generic listing scan.
//!
//! # Features
//!
//! - Bounded-concurrency dispatch, queued in request order
//! - Per-attempt deadlines with bounded retries for transient failures
//! - DOM polling on a fixed interval and on page mutations
//! - Guaranteed page release on every exit path
//! - Streamed progress events and exactly one completion event per job
//! - Accepted records appended to the result store as they arrive
//!
//! # Example
//!
//! ```rust,ignore
//! use lowball_scanner::{default_targets, JobDispatcher, ScrapeRequest};
//! use std::sync::Arc;
//!
//! let dispatcher = JobDispatcher::new(Arc::new(browser_engine), Arc::new(database));
//! let request = ScrapeRequest::builder("AK-47 | Redline", Wear::FieldTested)
//!     .targets(default_targets("AK-47 | Redline", Wear::FieldTested))
//!     .build();
//!
//! let mut job = dispatcher.dispatch(request)?;
//! while let Some(event) = job.next_event().await {
//!     println!("{event:?}");
//! }
//! let outcome = job.wait().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod aggregator;
#[allow(missing_docs)]
pub mod dispatcher;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod events;
pub mod extraction;
#[allow(missing_docs)]
pub mod extractor;
#[allow(missing_docs)]
pub mod marketplace;
#[allow(missing_docs)]
pub mod outcome;
pub mod price;
#[allow(missing_docs)]
pub mod request;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use dispatcher::{JobDispatcher, ScrapeJob};
pub use error::{ExtractionError, Result, ScanError};
pub use events::{JobEvent, OutcomeKind};
pub use extraction::{
    AttemptState, ExtractionAttempt, ExtractionMachine, ExtractionSettings, MarketplaceReport,
};
pub use extractor::{
    Candidate, ExtractorRegistry, ListingQuery, ListingScanExtractor, PriceExtractor,
    SelectorExtractor,
};
pub use marketplace::{build_search_url, default_targets, marketplace_for_url, Marketplace};
pub use outcome::{JobOutcome, MarketplaceEntry};
pub use request::{MarketplaceTarget, ScrapeRequest, ScrapeRequestBuilder};
pub use session::SessionGuard;
pub use store::ResultStore;
