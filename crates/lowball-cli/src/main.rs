//! Lowball command-line shell
//!
//! Thin wrapper that loads configuration, initializes logging and hands off
//! to the library crates under `crates/`.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lowball_core::{AppConfig, Currency, Wear};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lowball", version)]
#[command(about = "Find the lowest price of an item across marketplaces")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape current prices for an item
    Scrape {
        /// Item name, e.g. "AK-47 | Redline"
        item: String,

        /// Wear filter: FN, MW, FT, WW, BS or ANY
        #[arg(long, short, default_value = "ANY", value_parser = parse_wear)]
        wear: Wear,

        /// Only visit these marketplaces (repeatable)
        #[arg(long = "marketplace", short)]
        marketplaces: Vec<String>,

        /// Override the configured concurrency bound
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print the search URL for every marketplace
    Urls {
        item: String,

        #[arg(long, short, default_value = "ANY", value_parser = parse_wear)]
        wear: Wear,
    },

    /// Show the most recently stored prices
    Recent {
        #[arg(long, short, default_value_t = 20)]
        limit: u32,
    },

    /// Show the cheapest stored price for an item
    Lowest {
        item: String,

        #[arg(long, short, default_value = "USD", value_parser = parse_currency)]
        currency: Currency,
    },
}

fn parse_wear(s: &str) -> Result<Wear, String> {
    s.parse().map_err(|e: lowball_core::LowballError| e.to_string())
}

fn parse_currency(s: &str) -> Result<Currency, String> {
    s.parse().map_err(|e: lowball_core::LowballError| e.to_string())
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,lowball=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config.validate()?;
            config
        }
        None => AppConfig::load_with_env().context("failed to load config")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    info!("Starting Lowball v{}", env!("CARGO_PKG_VERSION"));
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Scrape {
            item,
            wear,
            marketplaces,
            max_concurrency,
            json,
        } => {
            let options = commands::ScrapeOptions {
                item,
                wear,
                marketplaces,
                max_concurrency,
                json,
            };
            commands::scrape(&config, options).await
        }
        Commands::Urls { item, wear } => {
            commands::print_urls(&item, wear);
            Ok(())
        }
        Commands::Recent { limit } => commands::recent(&config, limit).await,
        Commands::Lowest { item, currency } => commands::lowest(&config, &item, currency).await,
    }
}
