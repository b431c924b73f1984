//! Subcommand implementations.

use anyhow::{Context, Result};
use lowball_browser::BrowserEngine;
use lowball_core::{AppConfig, Currency, PriceRecord, Wear};
use lowball_db::Database;
use lowball_scanner::{
    default_targets, JobDispatcher, JobEvent, JobOutcome, Marketplace, MarketplaceTarget,
    ScrapeRequest,
};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ScrapeOptions {
    pub item: String,
    pub wear: Wear,
    pub marketplaces: Vec<String>,
    pub max_concurrency: Option<usize>,
    pub json: bool,
}

async fn open_database(config: &AppConfig) -> Result<Database> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = Database::new(&path)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    db.run_migrations()
        .await
        .context("failed to run database migrations")?;
    Ok(db)
}

/// Restrict the default target list to the named marketplaces, keeping
/// their canonical order.
fn select_targets(item: &str, wear: Wear, names: &[String]) -> Result<Vec<MarketplaceTarget>> {
    let targets = default_targets(item, wear);
    if names.is_empty() {
        return Ok(targets);
    }

    let wanted = names
        .iter()
        .map(|name| name.parse::<Marketplace>().map(|m| m.marketplace_id()))
        .collect::<Result<HashSet<_>, _>>()?;

    Ok(targets
        .into_iter()
        .filter(|t| wanted.contains(&t.marketplace_id))
        .collect())
}

pub async fn scrape(config: &AppConfig, options: ScrapeOptions) -> Result<()> {
    let targets = select_targets(&options.item, options.wear, &options.marketplaces)?;

    let mut builder = ScrapeRequest::builder(options.item.as_str(), options.wear)
        .config(&config.scraping)
        .targets(targets);
    if let Some(max) = options.max_concurrency {
        builder = builder.max_concurrency(max);
    }
    let request = builder.build();

    let db = open_database(config).await?;
    let engine = Arc::new(
        BrowserEngine::with_config(&config.browser)
            .await
            .context("failed to launch browser")?,
    );

    let dispatcher = JobDispatcher::new(engine.clone(), Arc::new(db.clone()));
    let mut job = dispatcher.dispatch(request)?;

    let cancel = job.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling scrape job");
            cancel.cancel();
        }
    });

    while let Some(event) = job.next_event().await {
        if options.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
    }

    let outcome = job.wait().await?;
    interrupt.abort();

    if !options.json {
        print_summary(&outcome);
    }

    engine.close_all().await;
    db.close().await;
    Ok(())
}

fn print_event(event: &JobEvent) {
    match event {
        JobEvent::Progress {
            completed_count,
            total_count,
            marketplace_id,
            outcome_kind,
        } => println!("[{completed_count}/{total_count}] {marketplace_id}: {outcome_kind}"),
        JobEvent::Error {
            marketplace_id,
            message,
            ..
        } => eprintln!("  {marketplace_id}: {message}"),
        JobEvent::Completed { .. } => {}
    }
}

fn print_summary(outcome: &JobOutcome) {
    println!();
    for record in outcome.records() {
        println!("  {}", format_record(record));
    }

    let mut any = false;
    for currency in [Currency::Usd, Currency::Eur, Currency::Cny] {
        if let Some(best) = outcome.best_offer(currency) {
            println!("Lowest {currency}: {}", format_record(best));
            any = true;
        }
    }
    if !any {
        println!("No prices found");
    }
}

fn format_record(record: &PriceRecord) -> String {
    format!(
        "{}{:.2} on {} ({})",
        record.currency.symbol(),
        record.price.amount(),
        record.marketplace_id,
        record.source_url
    )
}

pub fn print_urls(item: &str, wear: Wear) {
    for marketplace in Marketplace::ALL {
        println!(
            "{:<14} {}",
            marketplace.display_name(),
            marketplace.search_url(item, wear)
        );
    }
}

pub async fn recent(config: &AppConfig, limit: u32) -> Result<()> {
    let db = open_database(config).await?;
    let rows = db.list_recent(limit).await?;
    let total = db.count().await?;
    if rows.is_empty() {
        println!("No stored prices");
    } else {
        println!("Showing {} of {total} stored prices", rows.len());
    }
    for row in rows {
        println!(
            "{}  {}  {}",
            row.record.observed_at.to_rfc3339(),
            row.record.item_name,
            format_record(&row.record)
        );
    }
    db.close().await;
    Ok(())
}

pub async fn lowest(config: &AppConfig, item: &str, currency: Currency) -> Result<()> {
    let db = open_database(config).await?;
    match db.lowest_for_item(item, currency).await? {
        Some(row) => println!("{}", format_record(&row.record)),
        None => println!("No stored {currency} price for {item}"),
    }
    db.close().await;
    Ok(())
}
