//! Per-marketplace price extraction strategies.
//!
//! Each marketplace maps to one [`PriceExtractor`] in an
//! [`ExtractorRegistry`]. Marketplaces without a registered extractor fall
//! back to the generic listing scan.

use crate::marketplace::Marketplace;
use crate::price::parse_amount;
use async_trait::async_trait;
use lowball_browser::{RawListing, SessionHandle, SessionProvider};
use lowball_core::{MarketplaceId, Wear};
use std::collections::HashMap;
use std::sync::Arc;

/// What the extraction is looking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    /// Item name to match, case-insensitively, as a substring
    pub item_name: String,
    /// Wear filter
    pub wear: Wear,
}

impl ListingQuery {
    #[must_use]
    pub fn new(item_name: impl Into<String>, wear: Wear) -> Self {
        Self {
            item_name: item_name.into(),
            wear,
        }
    }

    /// Whether a listing satisfies the name, wear and float filters.
    ///
    /// Listings without a wear label or float value are not excluded for
    /// lacking them.
    #[must_use]
    pub fn matches(&self, listing: &RawListing) -> bool {
        if !listing
            .name
            .to_lowercase()
            .contains(&self.item_name.trim().to_lowercase())
        {
            return false;
        }
        if let Some(label) = &listing.wear {
            if !self.wear.matches_label(label) {
                return false;
            }
        }
        if let Some(float) = listing.float {
            if !self.wear.float_range().contains(float) {
                return false;
            }
        }
        true
    }
}

/// A price string found on the page, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Raw price text
    pub price_text: String,
    /// Item name as listed, when the page exposed one
    pub observed_name: Option<String>,
}

/// Finds a price candidate on an open page.
#[async_trait]
pub trait PriceExtractor: Send + Sync {
    /// One extraction pass. `Ok(None)` means nothing usable yet.
    ///
    /// Only a closed session should surface as an error; other query
    /// failures count as "not found".
    async fn extract(
        &self,
        provider: &dyn SessionProvider,
        session: &SessionHandle,
        query: &ListingQuery,
    ) -> lowball_browser::Result<Option<Candidate>>;
}

/// Cheapest listing matching `query`.
///
/// Matches whose price does not parse lose to any that does. When no match
/// parses, the first match is returned so its text fails validation.
#[must_use]
pub fn lowest_listing<'a>(listings: &'a [RawListing], query: &ListingQuery) -> Option<&'a RawListing> {
    let mut matching = listings.iter().filter(|l| query.matches(l)).peekable();
    let first = *matching.peek()?;

    matching
        .filter_map(|l| parse_amount(&l.price_text).map(|amount| (amount, l)))
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map_or(Some(first), |(_, l)| Some(l))
}

/// Generic fallback: enumerate listings and keep the cheapest match.
#[derive(Debug, Default, Clone, Copy)]
pub struct ListingScanExtractor;

#[async_trait]
impl PriceExtractor for ListingScanExtractor {
    async fn extract(
        &self,
        provider: &dyn SessionProvider,
        session: &SessionHandle,
        query: &ListingQuery,
    ) -> lowball_browser::Result<Option<Candidate>> {
        let listings = match provider.query_listings(session).await {
            Ok(listings) => listings,
            Err(e) if e.is_session_closed() => return Err(e),
            Err(e) => {
                tracing::debug!(%session, "listing query failed: {}", e);
                return Ok(None);
            }
        };

        let found = lowest_listing(&listings, query).map(|l| Candidate {
            price_text: l.price_text.clone(),
            observed_name: Some(l.name.clone()),
        });
        tracing::trace!(%session, listings = listings.len(), found = found.is_some(), "listing scan");
        Ok(found)
    }
}

/// Marketplace-specific selector first, listing scan second.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    selector: String,
    fallback: ListingScanExtractor,
}

impl SelectorExtractor {
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            fallback: ListingScanExtractor,
        }
    }

    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

#[async_trait]
impl PriceExtractor for SelectorExtractor {
    async fn extract(
        &self,
        provider: &dyn SessionProvider,
        session: &SessionHandle,
        query: &ListingQuery,
    ) -> lowball_browser::Result<Option<Candidate>> {
        match provider.query_fast_path(session, &self.selector).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                return Ok(Some(Candidate {
                    price_text: text,
                    observed_name: None,
                }));
            }
            Ok(_) => {}
            Err(e) if e.is_session_closed() => return Err(e),
            Err(e) => tracing::debug!(%session, selector = %self.selector, "fast path failed: {}", e),
        }

        self.fallback.extract(provider, session, query).await
    }
}

/// Extractors keyed by marketplace.
pub struct ExtractorRegistry {
    extractors: HashMap<MarketplaceId, Arc<dyn PriceExtractor>>,
    fallback: Arc<dyn PriceExtractor>,
}

impl ExtractorRegistry {
    /// Registry with only the listing-scan fallback.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
            fallback: Arc::new(ListingScanExtractor),
        }
    }

    /// Registry with a selector extractor for every known marketplace.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for marketplace in Marketplace::ALL {
            registry.register(
                marketplace.marketplace_id(),
                Arc::new(SelectorExtractor::new(marketplace.fast_path_selector())),
            );
        }
        registry
    }

    /// Add or replace the extractor for `id`.
    pub fn register(&mut self, id: MarketplaceId, extractor: Arc<dyn PriceExtractor>) {
        self.extractors.insert(id, extractor);
    }

    /// Extractor for `id`, or the listing scan when none is registered.
    #[must_use]
    pub fn get(&self, id: &MarketplaceId) -> Arc<dyn PriceExtractor> {
        self.extractors
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    #[must_use]
    pub fn contains(&self, id: &MarketplaceId) -> bool {
        self.extractors.contains_key(id)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("marketplaces", &self.extractors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
