//! Shared types used across the lowball workspace.
//!
//! This module defines the newtypes and enums that model the price-discovery
//! domain: marketplace identifiers, wear categories with their float bands,
//! validated prices and the immutable price record produced by a scrape.

use crate::error::LowballError;
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for marketplace identifiers with validation.
///
/// Marketplace IDs must be lowercase alphanumeric with hyphens, 2-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketplaceId(String);

impl MarketplaceId {
    /// Create a new `MarketplaceId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, LowballError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), LowballError> {
        static ID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = ID_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{0,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 2 || id.len() > 50 {
            return Err(LowballError::Validation(format!(
                "invalid marketplace ID: must be 2-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(LowballError::Validation(format!(
                "invalid marketplace ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for MarketplaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item condition category.
///
/// Each category corresponds to a band of the item's float value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wear {
    /// Factory New, float in `[0, 0.07)`
    #[serde(rename = "FN")]
    FactoryNew,
    /// Minimal Wear, float in `[0.07, 0.15)`
    #[serde(rename = "MW")]
    MinimalWear,
    /// Field-Tested, float in `[0.15, 0.38)`
    #[serde(rename = "FT")]
    FieldTested,
    /// Well-Worn, float in `[0.38, 0.45)`
    #[serde(rename = "WW")]
    WellWorn,
    /// Battle-Scarred, float in `[0.45, 1.0]`
    #[serde(rename = "BS")]
    BattleScarred,
    /// No wear filter
    #[serde(rename = "ANY")]
    Any,
}

impl Wear {
    /// All concrete wear categories, best condition first.
    pub const CONCRETE: [Wear; 5] = [
        Self::FactoryNew,
        Self::MinimalWear,
        Self::FieldTested,
        Self::WellWorn,
        Self::BattleScarred,
    ];

    /// Short code used by marketplaces (`FN`, `MW`, ...). Empty for `Any`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FactoryNew => "FN",
            Self::MinimalWear => "MW",
            Self::FieldTested => "FT",
            Self::WellWorn => "WW",
            Self::BattleScarred => "BS",
            Self::Any => "",
        }
    }

    /// Human-readable exterior name. Empty for `Any`.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::FactoryNew => "Factory New",
            Self::MinimalWear => "Minimal Wear",
            Self::FieldTested => "Field-Tested",
            Self::WellWorn => "Well-Worn",
            Self::BattleScarred => "Battle-Scarred",
            Self::Any => "",
        }
    }

    /// Zero-based index of the category, `None` for `Any`.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        Self::CONCRETE.iter().position(|w| w == self)
    }

    /// Float band for this category.
    #[must_use]
    pub fn float_range(&self) -> FloatRange {
        match self {
            Self::FactoryNew => FloatRange::half_open(0.0, 0.07),
            Self::MinimalWear => FloatRange::half_open(0.07, 0.15),
            Self::FieldTested => FloatRange::half_open(0.15, 0.38),
            Self::WellWorn => FloatRange::half_open(0.38, 0.45),
            Self::BattleScarred => FloatRange::closed(0.45, 1.0),
            Self::Any => FloatRange::closed(0.0, 1.0),
        }
    }

    /// Whether a listing's exterior label satisfies this filter.
    ///
    /// Accepts either the short code or the display name, case-insensitively.
    /// `Any` accepts every label.
    #[must_use]
    pub fn matches_label(&self, label: &str) -> bool {
        if *self == Self::Any {
            return true;
        }
        let label = label.trim().to_lowercase();
        label == self.code().to_lowercase() || label.contains(&self.display_name().to_lowercase())
    }
}

impl fmt::Display for Wear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ANY"),
            other => write!(f, "{}", other.code()),
        }
    }
}

impl FromStr for Wear {
    type Err = LowballError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        if normalized == "any" || normalized.is_empty() {
            return Ok(Self::Any);
        }
        Self::CONCRETE
            .into_iter()
            .find(|w| {
                normalized == w.code().to_lowercase()
                    || normalized == w.display_name().to_lowercase()
            })
            .ok_or_else(|| LowballError::Validation(format!("unknown wear category '{s}'")))
    }
}

/// Numeric float band of a wear category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    /// Inclusive lower bound
    pub min: f64,
    /// Upper bound, exclusive unless `max_inclusive`
    pub max: f64,
    /// Whether `max` itself belongs to the band
    pub max_inclusive: bool,
}

impl FloatRange {
    /// Band `[min, max)`.
    #[must_use]
    pub const fn half_open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_inclusive: false,
        }
    }

    /// Band `[min, max]`.
    #[must_use]
    pub const fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_inclusive: true,
        }
    }

    /// Whether `value` lies in the band. Non-finite values never do.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        if !value.is_finite() || value < self.min {
            return false;
        }
        if self.max_inclusive {
            value <= self.max
        } else {
            value < self.max
        }
    }
}

/// Currency detected from the symbol in a price string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar (`$`), also the default when no symbol is present
    Usd,
    /// Euro (`€`)
    Eur,
    /// Chinese yuan (`¥`)
    Cny,
}

impl Currency {
    /// Detect the currency from the first known symbol found in `text`.
    ///
    /// Checks `$`, then `€`, then `¥`; falls back to USD.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        if text.contains('$') {
            Self::Usd
        } else if text.contains('€') {
            Self::Eur
        } else if text.contains('¥') {
            Self::Cny
        } else {
            Self::Usd
        }
    }

    /// Currency symbol.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Cny => "¥",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Cny => "CNY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = LowballError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "USD" | "$" => Ok(Self::Usd),
            "EUR" | "€" => Ok(Self::Eur),
            "CNY" | "¥" => Ok(Self::Cny),
            other => Err(LowballError::Validation(format!(
                "unknown currency '{other}'"
            ))),
        }
    }
}

/// A validated price: always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    /// Create a price, rejecting NaN, infinities and negative values.
    ///
    /// # Errors
    /// Returns a validation error for non-finite or negative amounts.
    pub fn new(amount: f64) -> Result<Self, LowballError> {
        if amount.is_finite() && amount >= 0.0 {
            Ok(Self(amount))
        } else {
            Err(LowballError::Validation(format!(
                "price must be a finite non-negative number, got {amount}"
            )))
        }
    }

    /// Numeric amount.
    #[must_use]
    pub fn amount(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Price {
    type Error = LowballError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// An accepted price observation from one marketplace.
///
/// Immutable once built; the price inside is already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Marketplace the price was observed on
    pub marketplace_id: MarketplaceId,
    /// Item name as observed on the page (may differ from the query)
    pub item_name: String,
    /// Observed price
    pub price: Price,
    /// Currency of the price
    pub currency: Currency,
    /// Page the price was read from
    pub source_url: String,
    /// When the price was observed
    pub observed_at: Timestamp,
}

impl PriceRecord {
    /// Build a record observed now.
    #[must_use]
    pub fn new(
        marketplace_id: MarketplaceId,
        item_name: impl Into<String>,
        price: Price,
        currency: Currency,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            marketplace_id,
            item_name: item_name.into(),
            price,
            currency,
            source_url: source_url.into(),
            observed_at: Timestamp::now(),
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, LowballError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| LowballError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 with fixed nanosecond precision and a `Z` suffix.
    ///
    /// The fixed width keeps stored timestamps sortable as plain text.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
