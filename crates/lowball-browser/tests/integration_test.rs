use lowball_browser::{BrowserEngine, SessionHandle, SessionProvider};
use std::time::Duration;

const NAV_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_browser_engine_creation() {
    let engine = BrowserEngine::new().await;
    assert!(engine.is_ok(), "Failed to create browser engine");
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_open_query_close() {
    let engine = BrowserEngine::new().await.unwrap();

    let handle = engine
        .open("https://example.com", NAV_TIMEOUT)
        .await
        .expect("open example.com");
    assert_eq!(engine.open_sessions().await, 1);

    let heading = engine
        .query_fast_path(&handle, "h1")
        .await
        .expect("query heading");
    assert_eq!(heading.as_deref(), Some("Example Domain"));

    let missing = engine
        .query_fast_path(&handle, ".no-such-element")
        .await
        .expect("query missing element");
    assert!(missing.is_none());

    engine.close(&handle).await.expect("close session");
    assert_eq!(engine.open_sessions().await, 0);
}

#[tokio::test]
#[ignore] // Requires Chrome/Chromium installed
async fn test_close_is_idempotent() {
    let engine = BrowserEngine::new().await.unwrap();

    let handle = engine.open("https://example.com", NAV_TIMEOUT).await.unwrap();
    engine.close(&handle).await.expect("first close");
    engine.close(&handle).await.expect("second close is a no-op");

    let unknown = SessionHandle::new(9999, "https://example.com");
    engine.close(&unknown).await.expect("closing unknown handle");

    assert!(engine
        .query_listings(&handle)
        .await
        .is_err_and(|e| e.is_session_closed()));
}
