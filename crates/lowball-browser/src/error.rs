use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("session {0} is closed")]
    SessionClosed(u64),
}

impl BrowserError {
    /// Whether the page behind the session is gone for good.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed(_))
    }
}
