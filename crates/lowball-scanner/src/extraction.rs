//! Per-marketplace extraction state machine.
//!
//! One [`ExtractionMachine`] drives every attempt for a single marketplace:
//!
//! ```text
//! Starting -> Polling -> Validating -> Succeeded
//!    ^           |            |
//!    |           v            v
//!    +------- Retrying      Failed
//! ```
//!
//! `Starting` opens the page and arms the attempt deadline. `Polling` runs an
//! extraction pass on every interval tick and every DOM mutation until a
//! candidate shows up or the deadline fires. `Validating` turns the
//! candidate into a [`PriceRecord`]. Transient failures move to `Retrying`
//! and start over with the next attempt number while the retry budget
//! lasts. The page is released exactly once per attempt, on every path.

use crate::error::ExtractionError;
use crate::extractor::{Candidate, ListingQuery, PriceExtractor};
use crate::price;
use crate::request::MarketplaceTarget;
use crate::session::SessionGuard;
use lowball_browser::{MutationFeed, SessionHandle, SessionProvider};
use lowball_core::{MarketplaceId, PriceRecord};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Polling never runs faster than this.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Timing and retry settings for one marketplace visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Deadline for finding a price once the page is open
    pub per_attempt_timeout: Duration,
    /// Bound on opening and loading the page
    pub navigation_timeout: Duration,
    /// Interval between extraction passes
    pub poll_interval: Duration,
    /// Retries allowed after the first attempt
    pub max_retries: u32,
}

impl ExtractionSettings {
    /// Highest attempt number this machine may reach.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AttemptState {
    /// Opening the page
    Starting,
    /// Waiting for a price candidate
    Polling,
    /// Checking the candidate
    Validating,
    /// Record produced
    Succeeded,
    /// Transient failure, another attempt may follow
    Retrying,
    /// Gave up
    Failed,
}

impl AttemptState {
    /// `Succeeded` and `Failed` end the machine.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One attempt at extracting a price from one marketplace.
///
/// Owned by a single machine and never shared.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    marketplace_id: MarketplaceId,
    url: String,
    attempt_number: u32,
    state: AttemptState,
    deadline: Option<Instant>,
}

impl ExtractionAttempt {
    fn new(target: &MarketplaceTarget, attempt_number: u32) -> Self {
        Self {
            marketplace_id: target.marketplace_id.clone(),
            url: target.url.clone(),
            attempt_number,
            state: AttemptState::Starting,
            deadline: None,
        }
    }

    /// Marketplace being visited.
    #[must_use]
    pub fn marketplace_id(&self) -> &MarketplaceId {
        &self.marketplace_id
    }

    /// Page being visited.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 1-based attempt number.
    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Extraction deadline, armed once the page is open.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn arm_deadline(&mut self, timeout: Duration) -> Instant {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(deadline);
        deadline
    }

    fn transition(&mut self, next: AttemptState) {
        debug_assert!(
            !self.state.is_terminal(),
            "transition out of terminal state {}",
            self.state
        );
        tracing::trace!(
            marketplace = %self.marketplace_id,
            attempt = self.attempt_number,
            from = %self.state,
            to = %next,
            "attempt transition"
        );
        self.state = next;
    }
}

/// Final result of one marketplace's extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceReport {
    /// Marketplace visited
    pub marketplace_id: MarketplaceId,
    /// Page visited
    pub url: String,
    /// Attempts started, 0 when the job was cancelled before the first
    pub attempts: u32,
    /// Accepted record or the reason there is none
    pub result: Result<PriceRecord, ExtractionError>,
}

impl MarketplaceReport {
    /// Report for a target that never started.
    #[must_use]
    pub fn cancelled(target: &MarketplaceTarget) -> Self {
        Self {
            marketplace_id: target.marketplace_id.clone(),
            url: target.url.clone(),
            attempts: 0,
            result: Err(ExtractionError::Cancelled),
        }
    }
}

/// Drives the attempts for one marketplace target.
pub struct ExtractionMachine {
    target: MarketplaceTarget,
    query: ListingQuery,
    provider: Arc<dyn SessionProvider>,
    extractor: Arc<dyn PriceExtractor>,
    settings: ExtractionSettings,
}

impl ExtractionMachine {
    /// Machine for `target`, searching for `query`.
    #[must_use]
    pub fn new(
        target: MarketplaceTarget,
        query: ListingQuery,
        provider: Arc<dyn SessionProvider>,
        extractor: Arc<dyn PriceExtractor>,
        settings: ExtractionSettings,
    ) -> Self {
        Self {
            target,
            query,
            provider,
            extractor,
            settings,
        }
    }

    /// Run attempts until one succeeds, a terminal error occurs, the retry
    /// budget runs out, or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> MarketplaceReport {
        let max_attempts = self.settings.max_attempts();
        let mut attempts = 0;

        let result = loop {
            if cancel.is_cancelled() {
                break Err(ExtractionError::Cancelled);
            }

            attempts += 1;
            let mut attempt = ExtractionAttempt::new(&self.target, attempts);
            let result = self.run_attempt(&mut attempt, &cancel).await;

            match result {
                Err(e) if attempt.state() == AttemptState::Retrying => {
                    if attempts < max_attempts {
                        tracing::warn!(
                            marketplace = %self.target.marketplace_id,
                            attempt = attempts,
                            max_attempts,
                            "attempt failed, retrying: {}",
                            e
                        );
                        continue;
                    }
                    attempt.transition(AttemptState::Failed);
                    break Err(e);
                }
                other => break other,
            }
        };

        match &result {
            Ok(record) => tracing::info!(
                marketplace = %self.target.marketplace_id,
                attempts,
                price = %record.price,
                currency = %record.currency,
                "price extracted"
            ),
            Err(e) => tracing::warn!(
                marketplace = %self.target.marketplace_id,
                attempts,
                "extraction failed: {}",
                e
            ),
        }

        MarketplaceReport {
            marketplace_id: self.target.marketplace_id.clone(),
            url: self.target.url.clone(),
            attempts,
            result,
        }
    }

    /// One pass through `Starting -> Polling -> Validating`.
    ///
    /// On return the attempt is `Succeeded`, `Failed` or `Retrying`.
    async fn run_attempt(
        &self,
        attempt: &mut ExtractionAttempt,
        cancel: &CancellationToken,
    ) -> Result<PriceRecord, ExtractionError> {
        tracing::debug!(
            marketplace = %attempt.marketplace_id,
            attempt = attempt.attempt_number,
            url = %attempt.url,
            "starting attempt"
        );

        let guard = match SessionGuard::acquire(
            self.provider.clone(),
            &self.target.url,
            self.settings.navigation_timeout,
        )
        .await
        {
            Ok(guard) => guard,
            Err(e) => {
                let err = ExtractionError::AcquisitionError(e.to_string());
                attempt.transition(Self::after_error(&err));
                return Err(err);
            }
        };

        let deadline = attempt.arm_deadline(self.settings.per_attempt_timeout);
        attempt.transition(AttemptState::Polling);

        let result = match self.poll(guard.handle(), deadline, cancel).await {
            Ok(candidate) => {
                attempt.transition(AttemptState::Validating);
                self.validate(candidate)
            }
            Err(e) => Err(e),
        };

        guard.release().await;

        attempt.transition(match &result {
            Ok(_) => AttemptState::Succeeded,
            Err(e) => Self::after_error(e),
        });
        result
    }

    fn after_error(err: &ExtractionError) -> AttemptState {
        if err.is_retryable() {
            AttemptState::Retrying
        } else {
            AttemptState::Failed
        }
    }

    /// Wait for a price candidate, waking on interval ticks and mutations.
    async fn poll(
        &self,
        session: &SessionHandle,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Candidate, ExtractionError> {
        let mut mutations = match tokio::time::timeout_at(
            deadline,
            self.provider.subscribe_mutations(session),
        )
        .await
        {
            Ok(Ok(feed)) => feed,
            Ok(Err(e)) => {
                tracing::debug!(%session, "mutation feed unavailable: {}", e);
                None
            }
            Err(_) => None,
        };

        let mut ticker =
            tokio::time::interval(self.settings.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExtractionError::Cancelled),
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ExtractionError::ExtractionTimeout);
                }
                _ = ticker.tick() => {}
                () = next_mutation(&mut mutations) => {
                    tracing::trace!(%session, "dom mutation");
                }
            }

            let pass = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ExtractionError::Cancelled),
                pass = tokio::time::timeout_at(
                    deadline,
                    self.extractor.extract(self.provider.as_ref(), session, &self.query),
                ) => pass,
            };

            match pass {
                Ok(Ok(Some(candidate))) => return Ok(candidate),
                Ok(Ok(None)) | Err(_) => {}
                Ok(Err(e)) if e.is_session_closed() => {
                    return Err(ExtractionError::AcquisitionError(e.to_string()));
                }
                Ok(Err(e)) => tracing::debug!(%session, "extraction pass failed: {}", e),
            }
        }
    }

    fn validate(&self, candidate: Candidate) -> Result<PriceRecord, ExtractionError> {
        let (price, currency) = price::validate(&candidate.price_text)?;
        let item_name = candidate
            .observed_name
            .unwrap_or_else(|| self.query.item_name.clone());
        Ok(PriceRecord::new(
            self.target.marketplace_id.clone(),
            item_name,
            price,
            currency,
            self.target.url.clone(),
        ))
    }
}

/// Resolves on the next mutation; never resolves once the feed is gone.
async fn next_mutation(feed: &mut Option<MutationFeed>) {
    if let Some(rx) = feed.as_mut() {
        if rx.recv().await.is_some() {
            return;
        }
    }
    *feed = None;
    std::future::pending::<()>().await;
}
