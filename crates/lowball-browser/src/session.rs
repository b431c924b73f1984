//! The page session seam between the scraper core and a browser.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Receiver that yields once per observed DOM change burst.
///
/// Notifications are coalesced: a slow reader sees at most one pending wake.
pub type MutationFeed = mpsc::Receiver<()>;

/// Opaque reference to one open page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    id: u64,
    url: String,
}

impl SessionHandle {
    /// Create a handle. Providers allocate `id` uniquely per open page.
    #[must_use]
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
        }
    }

    /// Provider-assigned session id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// URL the page was opened at.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.id)
    }
}

/// One sale listing as scraped from a search results page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    /// Listed item name
    pub name: String,
    /// Exterior label, when the page shows one
    pub wear: Option<String>,
    /// Float value, when the page shows one
    pub float: Option<f64>,
    /// Unparsed price text
    pub price_text: String,
}

/// Opens, queries and closes browser pages.
///
/// Implementations must make `close` idempotent: closing an unknown or
/// already-closed handle succeeds without effect.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a page at `url` and wait for it to finish loading.
    ///
    /// The provider must not leave a page open when this returns an error.
    async fn open(&self, url: &str, navigation_timeout: Duration) -> Result<SessionHandle>;

    /// Text of the first element matching a marketplace-specific `selector`.
    async fn query_fast_path(&self, handle: &SessionHandle, selector: &str)
        -> Result<Option<String>>;

    /// All sale listings currently rendered on the page.
    async fn query_listings(&self, handle: &SessionHandle) -> Result<Vec<RawListing>>;

    /// Subscribe to DOM change notifications for the page.
    ///
    /// Providers without change tracking return `None`; callers then rely on
    /// interval polling alone.
    async fn subscribe_mutations(&self, _handle: &SessionHandle) -> Result<Option<MutationFeed>> {
        Ok(None)
    }

    /// Close the page. Idempotent.
    async fn close(&self, handle: &SessionHandle) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_accessors() {
        let handle = SessionHandle::new(3, "https://example.com/search");
        assert_eq!(handle.id(), 3);
        assert_eq!(handle.url(), "https://example.com/search");
        assert_eq!(handle.to_string(), "session#3");
    }
}
