use crate::error::{BrowserError, Result};

/// Helper to extract the host from a URL, without a leading `www.`
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.trim_start_matches("www.").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://steamcommunity.com/market/listings/730/x").unwrap(),
            "steamcommunity.com"
        );
        assert_eq!(
            extract_domain("https://www.c5game.com/en/csgo?keywords=x").unwrap(),
            "c5game.com"
        );
        assert_eq!(
            extract_domain("http://subdomain.example.com:8080/path").unwrap(),
            "subdomain.example.com"
        );
    }

    #[test]
    fn test_extract_domain_invalid() {
        assert!(extract_domain("not-a-url").is_err());
    }
}
