//! Lowball Core - Foundation crate for the lowball price scraper.
//!
//! This crate provides the shared domain types, error handling and
//! configuration management that every other lowball crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`MarketplaceId`, `Wear`, `Price`, `PriceRecord`)
//!
//! # Example
//!
//! ```rust
//! use lowball_core::{AppConfig, Wear};
//!
//! let config = AppConfig::default();
//! assert!(config.scraping.max_concurrency > 0);
//!
//! let range = Wear::FieldTested.float_range();
//! assert!(range.contains(0.2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, ScrapingConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, LowballError, Result};
pub use types::{Currency, FloatRange, MarketplaceId, Price, PriceRecord, Timestamp, Wear};
