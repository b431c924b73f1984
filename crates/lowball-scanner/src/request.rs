//! Scrape requests and their validation.

use crate::error::{Result, ScanError};
use crate::extraction::ExtractionSettings;
use lowball_core::{MarketplaceId, ScrapingConfig, Wear};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// One marketplace to visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceTarget {
    /// Marketplace identifier
    pub marketplace_id: MarketplaceId,
    /// Search page to open
    pub url: String,
}

impl MarketplaceTarget {
    /// Create a target.
    #[must_use]
    pub fn new(marketplace_id: MarketplaceId, url: impl Into<String>) -> Self {
        Self {
            marketplace_id,
            url: url.into(),
        }
    }
}

/// A request to price one item across several marketplaces.
///
/// Built with [`ScrapeRequest::builder`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    item_name: String,
    wear: Wear,
    targets: Vec<MarketplaceTarget>,
    max_concurrency: usize,
    per_attempt_timeout: Duration,
    max_retries: u32,
    navigation_timeout: Duration,
    poll_interval: Duration,
    persistence_timeout: Duration,
}

impl ScrapeRequest {
    /// Start building a request for `item_name` in condition `wear`.
    #[must_use]
    pub fn builder(item_name: impl Into<String>, wear: Wear) -> ScrapeRequestBuilder {
        ScrapeRequestBuilder::new(item_name.into(), wear)
    }

    #[must_use]
    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    #[must_use]
    pub fn wear(&self) -> Wear {
        self.wear
    }

    #[must_use]
    pub fn targets(&self) -> &[MarketplaceTarget] {
        &self.targets
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn persistence_timeout(&self) -> Duration {
        self.persistence_timeout
    }

    /// Timing and retry settings shared by every extraction in the job.
    #[must_use]
    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            per_attempt_timeout: self.per_attempt_timeout,
            navigation_timeout: self.navigation_timeout,
            poll_interval: self.poll_interval,
            max_retries: self.max_retries,
        }
    }

    /// Check the request can be dispatched.
    ///
    /// # Errors
    /// Rejects an empty item name, an empty target list, a marketplace
    /// targeted twice, or a concurrency bound of zero.
    pub fn validate(&self) -> Result<()> {
        if self.item_name.trim().is_empty() {
            return Err(ScanError::EmptyItemName);
        }
        if self.targets.is_empty() {
            return Err(ScanError::NoTargets);
        }
        if self.max_concurrency == 0 {
            return Err(ScanError::InvalidConcurrency);
        }

        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in &self.targets {
            if !seen.insert(&target.marketplace_id) {
                return Err(ScanError::DuplicateMarketplace(target.marketplace_id.clone()));
            }
        }
        Ok(())
    }
}

/// Builder for [`ScrapeRequest`], seeded with [`ScrapingConfig`] defaults.
#[derive(Debug, Clone)]
pub struct ScrapeRequestBuilder {
    request: ScrapeRequest,
}

impl ScrapeRequestBuilder {
    fn new(item_name: String, wear: Wear) -> Self {
        Self {
            request: ScrapeRequest {
                item_name,
                wear,
                targets: Vec::new(),
                max_concurrency: 0,
                per_attempt_timeout: Duration::ZERO,
                max_retries: 0,
                navigation_timeout: Duration::ZERO,
                poll_interval: Duration::ZERO,
                persistence_timeout: Duration::ZERO,
            },
        }
        .config(&ScrapingConfig::default())
    }

    /// Take timing, retry and concurrency settings from `config`.
    #[must_use]
    pub fn config(mut self, config: &ScrapingConfig) -> Self {
        let r = &mut self.request;
        r.max_concurrency = config.max_concurrency;
        r.per_attempt_timeout = config.per_attempt_timeout();
        r.max_retries = config.max_retries;
        r.navigation_timeout = config.navigation_timeout();
        r.poll_interval = config.poll_interval();
        r.persistence_timeout = config.persistence_timeout();
        self
    }

    #[must_use]
    pub fn target(mut self, target: MarketplaceTarget) -> Self {
        self.request.targets.push(target);
        self
    }

    #[must_use]
    pub fn targets(mut self, targets: impl IntoIterator<Item = MarketplaceTarget>) -> Self {
        self.request.targets.extend(targets);
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.request.max_concurrency = max;
        self
    }

    #[must_use]
    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.request.per_attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.request.max_retries = retries;
        self
    }

    #[must_use]
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.request.navigation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.request.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn persistence_timeout(mut self, timeout: Duration) -> Self {
        self.request.persistence_timeout = timeout;
        self
    }

    /// Finish the request. Validation happens at dispatch.
    #[must_use]
    pub fn build(self) -> ScrapeRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str) -> MarketplaceTarget {
        MarketplaceTarget::new(
            MarketplaceId::new(id).expect("valid id"),
            format!("https://{id}.example.com/search"),
        )
    }

    #[test]
    fn test_builder_uses_config_defaults() {
        let request = ScrapeRequest::builder("AK-47 | Redline", Wear::FieldTested)
            .target(target("steam"))
            .build();

        let defaults = ScrapingConfig::default();
        assert_eq!(request.max_concurrency(), defaults.max_concurrency);
        assert_eq!(request.max_retries(), defaults.max_retries);
        let settings = request.extraction_settings();
        assert_eq!(settings.per_attempt_timeout, defaults.per_attempt_timeout());
        assert_eq!(settings.poll_interval, defaults.poll_interval());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validation_rejections() {
        let empty_name = ScrapeRequest::builder("   ", Wear::Any)
            .target(target("steam"))
            .build();
        assert!(matches!(empty_name.validate(), Err(ScanError::EmptyItemName)));

        let no_targets = ScrapeRequest::builder("AWP | Asiimov", Wear::Any).build();
        assert!(matches!(no_targets.validate(), Err(ScanError::NoTargets)));

        let duplicate = ScrapeRequest::builder("AWP | Asiimov", Wear::Any)
            .targets([target("steam"), target("waxpeer"), target("steam")])
            .build();
        assert!(matches!(
            duplicate.validate(),
            Err(ScanError::DuplicateMarketplace(id)) if id.as_str() == "steam"
        ));

        let zero_width = ScrapeRequest::builder("AWP | Asiimov", Wear::Any)
            .target(target("steam"))
            .max_concurrency(0)
            .build();
        assert!(matches!(zero_width.validate(), Err(ScanError::InvalidConcurrency)));
    }

    #[test]
    fn test_target_wire_format() {
        let json = serde_json::to_value(target("gamerpay")).expect("serialize");
        assert_eq!(json["marketplaceId"], "gamerpay");
        assert_eq!(json["url"], "https://gamerpay.example.com/search");
    }
}
