use crate::error::{BrowserError, Result};
use crate::listing::{parse_listings, ListingSelectors};
use crate::session::{MutationFeed, RawListing, SessionHandle, SessionProvider};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::dom::{
    EnableParams, EventChildNodeInserted, EventDocumentUpdated, GetDocumentParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use lowball_core::BrowserConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Headless Chromium session provider.
///
/// Every session is a separate tab; tabs are tracked by session id so that
/// closing is idempotent.
pub struct BrowserEngine {
    browser: Browser,
    pages: RwLock<HashMap<u64, Page>>,
    next_id: AtomicU64,
    listing_selectors: ListingSelectors,
}

impl BrowserEngine {
    /// Launch a browser with default settings.
    pub async fn new() -> Result<Self> {
        Self::with_config(&BrowserConfig::default()).await
    }

    /// Launch a browser configured from the application settings.
    pub async fn with_config(config: &BrowserConfig) -> Result<Self> {
        let mut builder = ChromiumConfig::builder()
            .no_sandbox()
            .window_size(config.window_width, config.window_height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }

        let chromium_config = builder
            .build()
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!(headless = config.headless, "browser launched");

        Ok(Self {
            browser,
            pages: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            listing_selectors: ListingSelectors::default(),
        })
    }

    /// Replace the selectors used by the generic listing scan.
    #[must_use]
    pub fn with_listing_selectors(mut self, selectors: ListingSelectors) -> Self {
        self.listing_selectors = selectors;
        self
    }

    /// Number of tabs currently open through this engine.
    pub async fn open_sessions(&self) -> usize {
        self.pages.read().await.len()
    }

    /// Close every tab still open.
    pub async fn close_all(&self) {
        let pages: Vec<(u64, Page)> = self.pages.write().await.drain().collect();
        for (id, page) in pages {
            if let Err(e) = page.close().await {
                tracing::warn!(session = id, "failed to close tab: {}", e);
            }
        }
    }

    async fn page(&self, handle: &SessionHandle) -> Result<Page> {
        self.pages
            .read()
            .await
            .get(&handle.id())
            .cloned()
            .ok_or(BrowserError::SessionClosed(handle.id()))
    }
}

#[async_trait::async_trait]
impl SessionProvider for BrowserEngine {
    async fn open(&self, url: &str, navigation_timeout: Duration) -> Result<SessionHandle> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let navigation = tokio::time::timeout(navigation_timeout, async {
            page.goto(url).await?.wait_for_navigation().await?;
            Ok::<(), CdpError>(())
        })
        .await;

        let failure = match navigation {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(BrowserError::NavigationError(format!("{url}: {e}"))),
            Err(_) => Some(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {navigation_timeout:?}"
            ))),
        };

        if let Some(err) = failure {
            if let Err(e) = page.close().await {
                tracing::warn!("failed to close tab after navigation error: {}", e);
            }
            return Err(err);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pages.write().await.insert(id, page);
        tracing::debug!(session = id, url, "page loaded");

        Ok(SessionHandle::new(id, url))
    }

    async fn query_fast_path(
        &self,
        handle: &SessionHandle,
        selector: &str,
    ) -> Result<Option<String>> {
        let page = self.page(handle).await?;

        // find_element errors when nothing matches
        let Ok(element) = page.find_element(selector).await else {
            return Ok(None);
        };

        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        Ok(text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    async fn query_listings(&self, handle: &SessionHandle) -> Result<Vec<RawListing>> {
        let page = self.page(handle).await?;
        let html = page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        parse_listings(&html, &self.listing_selectors)
    }

    async fn subscribe_mutations(&self, handle: &SessionHandle) -> Result<Option<MutationFeed>> {
        let page = self.page(handle).await?;
        let chromium = |e: CdpError| BrowserError::ChromiumError(e.to_string());

        // DOM events only flow for nodes the client has requested
        page.execute(EnableParams::default()).await.map_err(chromium)?;
        page.execute(GetDocumentParams::builder().depth(-1).build())
            .await
            .map_err(chromium)?;

        let mut inserted = page
            .event_listener::<EventChildNodeInserted>()
            .await
            .map_err(chromium)?;
        let mut updated = page
            .event_listener::<EventDocumentUpdated>()
            .await
            .map_err(chromium)?;

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            loop {
                let open = tokio::select! {
                    event = inserted.next() => event.is_some(),
                    event = updated.next() => event.is_some(),
                    () = tx.closed() => false,
                };
                if !open {
                    break;
                }
                // Full channel means a wake is already pending
                let _ = tx.try_send(());
            }
        });

        Ok(Some(rx))
    }

    async fn close(&self, handle: &SessionHandle) -> Result<()> {
        let Some(page) = self.pages.write().await.remove(&handle.id()) else {
            return Ok(());
        };

        page.close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        tracing::debug!(session = handle.id(), "page closed");
        Ok(())
    }
}
