//! Scripted session provider and in-memory store for job tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lowball_browser::{BrowserError, RawListing, Result as BrowserResult, SessionHandle, SessionProvider};
use lowball_core::{MarketplaceId, PriceRecord, Wear};
use lowball_scanner::{JobEvent, MarketplaceTarget, ResultStore, ScanError, ScrapeRequest};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// How a page at one URL behaves.
#[derive(Debug, Clone)]
pub enum PageScript {
    /// Fast path shows this text immediately.
    Price(String),
    /// The first `timeouts` sessions never show a price; later ones do.
    SlowThenPrice { timeouts: u32, price: String },
    /// Nothing ever appears.
    Never,
    /// Every open fails.
    FailOpen,
    /// No fast-path element; these listings are rendered.
    Listings(Vec<RawListing>),
}

#[derive(Default)]
struct State {
    next_id: u64,
    live: HashMap<u64, String>,
    open_order: Vec<String>,
    opens_per_url: HashMap<String, u32>,
    session_ordinal: HashMap<u64, u32>,
    closes: HashMap<u64, u32>,
    active: usize,
    max_active: usize,
}

pub struct MockProvider {
    scripts: HashMap<String, PageScript>,
    open_delay: Duration,
    state: Mutex<State>,
}

impl MockProvider {
    pub fn new(scripts: impl IntoIterator<Item = (String, PageScript)>) -> Self {
        Self {
            scripts: scripts.into_iter().collect(),
            open_delay: Duration::ZERO,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// URLs in the order pages were opened.
    pub fn open_order(&self) -> Vec<String> {
        self.state.lock().unwrap().open_order.clone()
    }

    pub fn opens_for(&self, url: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .opens_per_url
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Most sessions opening or open at the same time.
    pub fn max_active(&self) -> usize {
        self.state.lock().unwrap().max_active
    }

    /// Every opened session was closed, and closed exactly once.
    pub fn assert_all_released_once(&self) {
        let state = self.state.lock().unwrap();
        assert!(state.live.is_empty(), "sessions still open: {:?}", state.live);
        for id in state.session_ordinal.keys() {
            assert_eq!(
                state.closes.get(id).copied().unwrap_or(0),
                1,
                "session {id} close count"
            );
        }
    }

    fn script(&self, url: &str) -> PageScript {
        self.scripts.get(url).cloned().unwrap_or(PageScript::Never)
    }
}

#[async_trait]
impl SessionProvider for MockProvider {
    async fn open(&self, url: &str, _timeout: Duration) -> BrowserResult<SessionHandle> {
        {
            let mut state = self.state.lock().unwrap();
            state.open_order.push(url.to_string());
            *state.opens_per_url.entry(url.to_string()).or_default() += 1;
            state.active += 1;
            state.max_active = state.max_active.max(state.active);
        }
        if matches!(self.script(url), PageScript::FailOpen) {
            self.state.lock().unwrap().active -= 1;
            return Err(BrowserError::NavigationError(format!("{url} unreachable")));
        }
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let ordinal = state.opens_per_url[url];
        state.live.insert(id, url.to_string());
        state.session_ordinal.insert(id, ordinal);
        Ok(SessionHandle::new(id, url))
    }

    async fn query_fast_path(
        &self,
        handle: &SessionHandle,
        _selector: &str,
    ) -> BrowserResult<Option<String>> {
        let ordinal = {
            let state = self.state.lock().unwrap();
            if !state.live.contains_key(&handle.id()) {
                return Err(BrowserError::SessionClosed(handle.id()));
            }
            state.session_ordinal[&handle.id()]
        };

        Ok(match self.script(handle.url()) {
            PageScript::Price(text) => Some(text),
            PageScript::SlowThenPrice { timeouts, price } if ordinal > timeouts => Some(price),
            _ => None,
        })
    }

    async fn query_listings(&self, handle: &SessionHandle) -> BrowserResult<Vec<RawListing>> {
        match self.script(handle.url()) {
            PageScript::Listings(listings) => Ok(listings),
            _ => Ok(Vec::new()),
        }
    }

    async fn close(&self, handle: &SessionHandle) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.live.remove(&handle.id()).is_some() {
            state.active -= 1;
        }
        *state.closes.entry(handle.id()).or_default() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub records: Mutex<Vec<PriceRecord>>,
    pub fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn append(&self, record: &PriceRecord) -> lowball_scanner::Result<()> {
        if self.fail {
            return Err(ScanError::Store("database is locked".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn target(id: &str) -> MarketplaceTarget {
    MarketplaceTarget::new(
        MarketplaceId::new(id).unwrap(),
        format!("https://{id}.example.com/search"),
    )
}

pub fn url(id: &str) -> String {
    format!("https://{id}.example.com/search")
}

pub fn request(item: &str, wear: Wear, ids: &[&str]) -> lowball_scanner::ScrapeRequestBuilder {
    ScrapeRequest::builder(item, wear)
        .targets(ids.iter().map(|id| target(id)))
        .per_attempt_timeout(Duration::from_secs(10))
        .poll_interval(Duration::from_millis(500))
        .navigation_timeout(Duration::from_secs(30))
        .persistence_timeout(Duration::from_secs(5))
}

/// Drain every event of a job.
pub async fn collect_events(job: &mut lowball_scanner::ScrapeJob) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(event) = job.next_event().await {
        events.push(event);
    }
    events
}

/// Progress counts are 1..=total in order and `Completed` is the single
/// last event.
pub fn assert_event_protocol(events: &[JobEvent], total: usize) {
    let counts: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress {
                completed_count,
                total_count,
                ..
            } => {
                assert_eq!(*total_count, total);
                Some(*completed_count)
            }
            _ => None,
        })
        .collect();
    assert_eq!(counts, (1..=total).collect::<Vec<_>>());
    assert_eq!(events.iter().filter(|e| e.is_completed()).count(), 1);
    assert!(events.last().is_some_and(JobEvent::is_completed));
}
