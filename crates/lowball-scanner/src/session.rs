//! Scoped page sessions.
//!
//! A [`SessionGuard`] owns one open page. [`SessionGuard::release`] closes it
//! exactly once; a guard dropped without release (a panicking task, an
//! aborted future) schedules the close on the runtime instead.

use lowball_browser::{BrowserError, SessionHandle, SessionProvider};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single close call.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack past the navigation timeout before `acquire` gives up on the
/// provider. The provider enforces the navigation timeout itself and must
/// get to clean up a half-opened page first.
const OPEN_GRACE: Duration = Duration::from_secs(10);

/// An open page that is closed when the guard is released or dropped.
pub struct SessionGuard {
    provider: Arc<dyn SessionProvider>,
    handle: SessionHandle,
    released: bool,
}

impl SessionGuard {
    /// Open a page at `url`. The provider bounds navigation by
    /// `navigation_timeout`; a provider that overruns it by more than a
    /// grace period is abandoned.
    ///
    /// No page is left open when this fails.
    pub async fn acquire(
        provider: Arc<dyn SessionProvider>,
        url: &str,
        navigation_timeout: Duration,
    ) -> lowball_browser::Result<Self> {
        let limit = navigation_timeout.saturating_add(OPEN_GRACE);
        let handle = tokio::time::timeout(limit, provider.open(url, navigation_timeout))
            .await
            .map_err(|_| {
                tracing::warn!(url, ?limit, "provider ignored its navigation timeout");
                BrowserError::Timeout(format!("opening {url} exceeded {limit:?}"))
            })??;

        tracing::debug!(session = %handle, url, "session acquired");
        Ok(Self {
            provider,
            handle,
            released: false,
        })
    }

    /// The open page.
    #[must_use]
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Close the page. Close failures are logged, not returned.
    pub async fn release(mut self) {
        self.released = true;
        close(self.provider.as_ref(), &self.handle).await;
    }
}

async fn close(provider: &dyn SessionProvider, handle: &SessionHandle) {
    match tokio::time::timeout(RELEASE_TIMEOUT, provider.close(handle)).await {
        Ok(Ok(())) => tracing::debug!(session = %handle, "session released"),
        Ok(Err(e)) => tracing::warn!(session = %handle, "failed to close session: {}", e),
        Err(_) => tracing::warn!(session = %handle, "closing session timed out"),
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let handle = self.handle.clone();
        tracing::warn!(session = %handle, "session guard dropped without release");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let provider = self.provider.clone();
                runtime.spawn(async move {
                    close(provider.as_ref(), &handle).await;
                });
            }
            Err(_) => tracing::error!(session = %handle, "no runtime to close session on"),
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lowball_browser::{RawListing, Result as BrowserResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        opens: AtomicU32,
        closes: AtomicU32,
        open_tabs: AtomicU32,
        hang_on_open: bool,
        hang_on_navigation: bool,
    }

    #[async_trait]
    impl SessionProvider for CountingProvider {
        async fn open(&self, url: &str, timeout: Duration) -> BrowserResult<SessionHandle> {
            if self.hang_on_open {
                std::future::pending::<()>().await;
            }
            if self.hang_on_navigation {
                // Tab exists before navigation starts, like a browser new_page
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.open_tabs.fetch_add(1, Ordering::SeqCst);
                let navigation = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
                if navigation.is_err() {
                    self.open_tabs.fetch_sub(1, Ordering::SeqCst);
                    return Err(BrowserError::Timeout(format!("navigation to {url}")));
                }
            }
            let id = self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(SessionHandle::new(u64::from(id), url))
        }

        async fn query_fast_path(
            &self,
            _handle: &SessionHandle,
            _selector: &str,
        ) -> BrowserResult<Option<String>> {
            Ok(None)
        }

        async fn query_listings(&self, _handle: &SessionHandle) -> BrowserResult<Vec<RawListing>> {
            Ok(Vec::new())
        }

        async fn close(&self, _handle: &SessionHandle) -> BrowserResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_release_closes_once() {
        let provider = Arc::new(CountingProvider::default());
        let guard = SessionGuard::acquire(provider.clone(), "https://example.com", Duration::from_secs(1))
            .await
            .expect("acquire");
        assert_eq!(guard.handle().url(), "https://example.com");

        guard.release().await;
        assert_eq!(provider.opens.load(Ordering::SeqCst), 1);
        assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_schedules_close() {
        let provider = Arc::new(CountingProvider::default());
        let guard = SessionGuard::acquire(provider.clone(), "https://example.com", Duration::from_secs(1))
            .await
            .expect("acquire");

        drop(guard);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_is_bounded() {
        let provider = Arc::new(CountingProvider {
            hang_on_open: true,
            ..CountingProvider::default()
        });

        let result = SessionGuard::acquire(provider.clone(), "https://example.com", Duration::from_secs(30)).await;
        assert!(matches!(result, Err(BrowserError::Timeout(_))));
        assert_eq!(provider.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_navigation_leaves_no_tab() {
        let provider = Arc::new(CountingProvider {
            hang_on_navigation: true,
            ..CountingProvider::default()
        });

        let result = SessionGuard::acquire(provider.clone(), "https://example.com", Duration::from_secs(30)).await;
        assert!(matches!(result, Err(BrowserError::Timeout(_))));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.open_tabs.load(Ordering::SeqCst), 0);
        assert_eq!(provider.opens.load(Ordering::SeqCst), 0);
    }
}
