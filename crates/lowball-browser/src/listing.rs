//! Generic listing scan over rendered search result HTML.

use crate::error::{BrowserError, Result};
use crate::session::RawListing;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// CSS selectors used to pick listings and their fields out of a results page.
///
/// Field selectors are evaluated relative to each listing element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    pub listing: String,
    pub name: String,
    pub wear: String,
    pub float: String,
    pub price: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            listing: "[data-listing], .listing, .market-item, .item-card, .market_listing_row"
                .to_string(),
            name: "[data-name], .item-name, .name, .market_listing_item_name".to_string(),
            wear: "[data-wear], .wear, .exterior".to_string(),
            float: "[data-float], .float, .float-value".to_string(),
            price: "[data-price], .price, .market_listing_price".to_string(),
        }
    }
}

struct Compiled {
    listing: Selector,
    name: Selector,
    wear: Selector,
    float: Selector,
    price: Selector,
}

impl Compiled {
    fn new(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            listing: compile(&selectors.listing)?,
            name: compile(&selectors.name)?,
            wear: compile(&selectors.wear)?,
            float: compile(&selectors.float)?,
            price: compile(&selectors.price)?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| BrowserError::InvalidSelector(format!("{selector}: {e}")))
}

/// Extract every listing that has both a name and a price.
///
/// Wear and float are optional; a listing without them is still returned.
pub fn parse_listings(html: &str, selectors: &ListingSelectors) -> Result<Vec<RawListing>> {
    let compiled = Compiled::new(selectors)?;
    let document = Html::parse_document(html);

    let listings = document
        .select(&compiled.listing)
        .filter_map(|element| parse_listing(&element, &compiled))
        .collect();

    Ok(listings)
}

fn parse_listing(element: &ElementRef, selectors: &Compiled) -> Option<RawListing> {
    let name = field_text(element, &selectors.name, "data-name")?;
    let price_text = field_text(element, &selectors.price, "data-price")?;
    let wear = field_text(element, &selectors.wear, "data-wear");
    let float = field_text(element, &selectors.float, "data-float").and_then(|s| parse_float(&s));

    Some(RawListing {
        name,
        wear,
        float,
        price_text,
    })
}

/// Text of the first matching child, else the attribute of the same name on
/// the matched child, else on the listing element itself.
fn field_text(element: &ElementRef, selector: &Selector, attr: &str) -> Option<String> {
    let from_child = element.select(selector).next().and_then(|child| {
        let text = child.text().collect::<String>().trim().to_string();
        if text.is_empty() {
            child.value().attr(attr).map(|v| v.trim().to_string())
        } else {
            Some(text)
        }
    });

    from_child
        .or_else(|| element.value().attr(attr).map(|v| v.trim().to_string()))
        .filter(|s| !s.is_empty())
}

fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listings() {
        let html = r#"
            <div class="results">
                <div class="listing">
                    <span class="item-name">AK-47 | Redline</span>
                    <span class="exterior">Field-Tested</span>
                    <span class="float">Float: 0.2513</span>
                    <span class="price">$14.20</span>
                </div>
                <div class="listing" data-name="AK-47 | Redline" data-price="$13.75"></div>
                <div class="listing">
                    <span class="item-name">No price here</span>
                </div>
            </div>
        "#;

        let listings = parse_listings(html, &ListingSelectors::default()).expect("parse listings");

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].name, "AK-47 | Redline");
        assert_eq!(listings[0].wear.as_deref(), Some("Field-Tested"));
        assert_eq!(listings[0].float, Some(0.2513));
        assert_eq!(listings[0].price_text, "$14.20");

        assert_eq!(listings[1].price_text, "$13.75");
        assert!(listings[1].wear.is_none());
        assert!(listings[1].float.is_none());
    }

    #[test]
    fn test_invalid_selector() {
        let selectors = ListingSelectors {
            listing: "[[".to_string(),
            ..ListingSelectors::default()
        };
        let result = parse_listings("<html></html>", &selectors);
        assert!(matches!(result, Err(BrowserError::InvalidSelector(_))));
    }

    #[test]
    fn test_empty_page() {
        let listings =
            parse_listings("<html><body></body></html>", &ListingSelectors::default()).unwrap();
        assert!(listings.is_empty());
    }
}
