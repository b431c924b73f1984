//! Page session provider for marketplace scraping.
//!
//! Defines the [`SessionProvider`] seam the scraper core drives (open a page,
//! query it, close it) and a headless Chromium implementation of it, plus the
//! generic listing scan used when a marketplace has no direct price element.

pub mod actions;
pub mod engine;
pub mod error;
pub mod listing;
pub mod session;

pub use actions::extract_domain;
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use listing::{parse_listings, ListingSelectors};
pub use session::{MutationFeed, RawListing, SessionHandle, SessionProvider};
