//! Known marketplaces and their search URL formats.

use crate::error::{Result, ScanError};
use crate::request::MarketplaceTarget;
use lowball_core::{MarketplaceId, Wear};
use std::fmt;
use std::str::FromStr;
use urlencoding::encode;

/// A marketplace the scraper knows how to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marketplace {
    Steam,
    AvanMarket,
    C5Game,
    WhiteMarket,
    Waxpeer,
    SkinBaron,
    ShadowPay,
    GamerPay,
    CsMoney,
    CsDeals,
}

impl Marketplace {
    /// Every marketplace, in default dispatch order.
    pub const ALL: [Marketplace; 10] = [
        Self::Steam,
        Self::AvanMarket,
        Self::C5Game,
        Self::WhiteMarket,
        Self::Waxpeer,
        Self::SkinBaron,
        Self::ShadowPay,
        Self::GamerPay,
        Self::CsMoney,
        Self::CsDeals,
    ];

    /// Stable identifier.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::Steam => "steam",
            Self::AvanMarket => "avan",
            Self::C5Game => "c5game",
            Self::WhiteMarket => "white",
            Self::Waxpeer => "waxpeer",
            Self::SkinBaron => "skinbaron",
            Self::ShadowPay => "shadowpay",
            Self::GamerPay => "gamerpay",
            Self::CsMoney => "csmoney",
            Self::CsDeals => "csdeals",
        }
    }

    /// Identifier as a validated [`MarketplaceId`].
    #[must_use]
    pub fn marketplace_id(&self) -> MarketplaceId {
        MarketplaceId::new(self.id()).expect("built-in marketplace ids are valid")
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Steam => "Steam",
            Self::AvanMarket => "Avan Market",
            Self::C5Game => "C5Game",
            Self::WhiteMarket => "White Market",
            Self::Waxpeer => "Waxpeer",
            Self::SkinBaron => "SkinBaron",
            Self::ShadowPay => "ShadowPay",
            Self::GamerPay => "GamerPay",
            Self::CsMoney => "CS.Money",
            Self::CsDeals => "CS.Deals",
        }
    }

    /// Host the marketplace serves its search pages from.
    #[must_use]
    pub fn domain(&self) -> &'static str {
        match self {
            Self::Steam => "steamcommunity.com",
            Self::AvanMarket => "avan.market",
            Self::C5Game => "c5game.com",
            Self::WhiteMarket => "white.market",
            Self::Waxpeer => "waxpeer.com",
            Self::SkinBaron => "skinbaron.de",
            Self::ShadowPay => "shadowpay.com",
            Self::GamerPay => "gamerpay.gg",
            Self::CsMoney => "cs.money",
            Self::CsDeals => "cs.deals",
        }
    }

    /// CSS selector expected to hold the lowest price on a results page
    /// sorted by ascending price.
    #[must_use]
    pub fn fast_path_selector(&self) -> &'static str {
        match self {
            Self::Steam => ".market_listing_price.market_listing_price_with_fee",
            Self::AvanMarket => ".market-item .price",
            Self::C5Game => ".list-item .price",
            Self::WhiteMarket => ".market-item__price",
            Self::Waxpeer => ".item_price",
            Self::SkinBaron => ".offer-card .price",
            Self::ShadowPay => ".item-card__price",
            Self::GamerPay => "[data-testid='item-price']",
            Self::CsMoney => ".bottom-price",
            Self::CsDeals => ".item-price",
        }
    }

    /// Search URL for `item` filtered to `wear`.
    #[must_use]
    pub fn search_url(&self, item: &str, wear: Wear) -> String {
        build_search_url(*self, item, wear)
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Marketplace {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        let id = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.id() == id)
            .ok_or_else(|| ScanError::UnknownMarketplace(s.to_string()))
    }
}

impl TryFrom<&MarketplaceId> for Marketplace {
    type Error = ScanError;

    fn try_from(id: &MarketplaceId) -> Result<Self> {
        id.as_str().parse()
    }
}

/// Build the search URL for one marketplace.
///
/// `Wear::Any` leaves every exterior filter empty.
#[must_use]
pub fn build_search_url(marketplace: Marketplace, item: &str, wear: Wear) -> String {
    let query = encode(item);
    let wear_name = wear.display_name();

    match marketplace {
        Marketplace::Steam => {
            let hash_name = if wear == Wear::Any {
                item.to_string()
            } else {
                format!("{item} ({wear_name})")
            };
            format!(
                "https://steamcommunity.com/market/listings/730/{}",
                encode(&hash_name)
            )
        }
        Marketplace::AvanMarket => {
            let range = wear.float_range();
            format!(
                "https://avan.market/en/market/cs?name={query}&sort=1&float_min={}&float_max={}",
                range.min, range.max
            )
        }
        Marketplace::C5Game => format!(
            "https://www.c5game.com/en/csgo?keywords={query}&exterior={}",
            wear_name.replace(' ', "%20")
        ),
        Marketplace::WhiteMarket => format!(
            "https://white.market/market?name={query}&sort=pr_a&unique=false&exterior={}",
            exterior_code(wear, "e")
        ),
        Marketplace::Waxpeer => format!(
            "https://waxpeer.com/?all=0&search={query}&exterior={}",
            wear.code()
        ),
        Marketplace::SkinBaron => format!("https://skinbaron.de/en/csgo?str={query}&sort=PA"),
        Marketplace::ShadowPay => {
            let exteriors = if wear == Wear::Any {
                String::new()
            } else {
                encode(&format!("[\"{wear_name}\"]")).into_owned()
            };
            format!(
                "https://shadowpay.com/csgo-items?search={query}&sort_column=price&sort_dir=asc&exteriors={exteriors}"
            )
        }
        Marketplace::GamerPay => format!(
            "https://gamerpay.gg/?query={query}&sortBy=price&ascending=true&page=1&wear={}",
            wear_name.replace(' ', "%20")
        ),
        Marketplace::CsMoney => format!(
            "https://cs.money/market/buy/?limit=60&offset=0&name={query}&order=asc&sort=price&exterior={}",
            wear_name.replace(' ', "+")
        ),
        Marketplace::CsDeals => format!(
            "https://cs.deals/new/p2p?sort=price&sort_desc=0&name={query}&exact_match=1&exterior={}",
            exterior_code(wear, "WearCategory")
        ),
    }
}

/// Indexed exterior code such as `e2` or `WearCategory2`.
fn exterior_code(wear: Wear, prefix: &str) -> String {
    wear.index()
        .map(|i| format!("{prefix}{i}"))
        .unwrap_or_default()
}

/// Which known marketplace serves `url`, if any.
#[must_use]
pub fn marketplace_for_url(url: &str) -> Option<Marketplace> {
    let host = lowball_browser::extract_domain(url).ok()?;
    Marketplace::ALL.into_iter().find(|m| {
        host == m.domain() || host.ends_with(&format!(".{}", m.domain()))
    })
}

/// One target per known marketplace, in default order.
#[must_use]
pub fn default_targets(item: &str, wear: Wear) -> Vec<MarketplaceTarget> {
    Marketplace::ALL
        .into_iter()
        .map(|m| MarketplaceTarget::new(m.marketplace_id(), m.search_url(item, wear)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM: &str = "AK-47 | Redline";

    #[test]
    fn test_ids_are_valid_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for m in Marketplace::ALL {
            assert_eq!(m.marketplace_id().as_str(), m.id());
            assert!(seen.insert(m.id()), "duplicate id {}", m.id());
            assert_eq!(m.id().parse::<Marketplace>().unwrap(), m);
        }
        assert!("nonexistent".parse::<Marketplace>().is_err());
    }

    #[test]
    fn test_steam_url() {
        assert_eq!(
            build_search_url(Marketplace::Steam, ITEM, Wear::FieldTested),
            "https://steamcommunity.com/market/listings/730/AK-47%20%7C%20Redline%20%28Field-Tested%29"
        );
        assert_eq!(
            build_search_url(Marketplace::Steam, ITEM, Wear::Any),
            "https://steamcommunity.com/market/listings/730/AK-47%20%7C%20Redline"
        );
    }

    #[test]
    fn test_float_range_url() {
        assert_eq!(
            build_search_url(Marketplace::AvanMarket, ITEM, Wear::MinimalWear),
            "https://avan.market/en/market/cs?name=AK-47%20%7C%20Redline&sort=1&float_min=0.07&float_max=0.15"
        );
        assert!(build_search_url(Marketplace::AvanMarket, ITEM, Wear::Any)
            .ends_with("&float_min=0&float_max=1"));
    }

    #[test]
    fn test_exterior_codes() {
        assert!(build_search_url(Marketplace::WhiteMarket, ITEM, Wear::FieldTested)
            .ends_with("&exterior=e2"));
        assert!(build_search_url(Marketplace::CsDeals, ITEM, Wear::BattleScarred)
            .ends_with("&exterior=WearCategory4"));
        assert!(build_search_url(Marketplace::Waxpeer, ITEM, Wear::WellWorn)
            .ends_with("&exterior=WW"));
        assert!(build_search_url(Marketplace::CsMoney, ITEM, Wear::FactoryNew)
            .ends_with("&exterior=Factory+New"));
        assert!(build_search_url(Marketplace::GamerPay, ITEM, Wear::MinimalWear)
            .ends_with("&wear=Minimal%20Wear"));
        assert!(build_search_url(Marketplace::ShadowPay, ITEM, Wear::FieldTested)
            .ends_with("&exteriors=%5B%22Field-Tested%22%5D"));
    }

    #[test]
    fn test_any_wear_leaves_filters_empty() {
        for m in [
            Marketplace::C5Game,
            Marketplace::WhiteMarket,
            Marketplace::Waxpeer,
            Marketplace::ShadowPay,
            Marketplace::CsMoney,
            Marketplace::CsDeals,
        ] {
            let url = build_search_url(m, ITEM, Wear::Any);
            assert!(url.ends_with('='), "{m}: {url}");
        }
    }

    #[test]
    fn test_marketplace_for_url() {
        for m in Marketplace::ALL {
            let url = m.search_url(ITEM, Wear::FieldTested);
            assert_eq!(marketplace_for_url(&url), Some(m), "{url}");
        }
        assert_eq!(marketplace_for_url("https://example.com/?q=x"), None);
        assert_eq!(marketplace_for_url("not a url"), None);
    }

    #[test]
    fn test_default_targets_order() {
        let targets = default_targets(ITEM, Wear::FieldTested);
        assert_eq!(targets.len(), Marketplace::ALL.len());
        assert_eq!(targets[0].marketplace_id.as_str(), "steam");
        assert_eq!(targets[9].marketplace_id.as_str(), "csdeals");
        assert!(targets[5].url.starts_with("https://skinbaron.de/"));
    }
}
