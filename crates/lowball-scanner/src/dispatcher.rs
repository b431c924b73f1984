//! Job dispatcher: fans one scrape request out into bounded-concurrency
//! marketplace extractions.

use crate::aggregator::Aggregator;
use crate::error::{ExtractionError, Result, ScanError};
use crate::events::JobEvent;
use crate::extraction::{ExtractionMachine, MarketplaceReport};
use crate::extractor::{ExtractorRegistry, ListingQuery};
use crate::outcome::JobOutcome;
use crate::request::{MarketplaceTarget, ScrapeRequest};
use crate::store::ResultStore;
use futures::FutureExt;
use lowball_browser::SessionProvider;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Starts scrape jobs against a session provider and result store.
#[derive(Clone)]
pub struct JobDispatcher {
    provider: Arc<dyn SessionProvider>,
    store: Arc<dyn ResultStore>,
    extractors: Arc<ExtractorRegistry>,
}

impl JobDispatcher {
    /// Dispatcher using the default extractor for every known marketplace.
    #[must_use]
    pub fn new(provider: Arc<dyn SessionProvider>, store: Arc<dyn ResultStore>) -> Self {
        Self {
            provider,
            store,
            extractors: Arc::new(ExtractorRegistry::with_defaults()),
        }
    }

    /// Replace the extractor registry.
    #[must_use]
    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = Arc::new(extractors);
        self
    }

    /// Validate `request` and start it in the background.
    ///
    /// Invalid requests are rejected before any page is opened. Must be
    /// called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns the validation error for an empty item name, no targets,
    /// duplicate marketplaces, or a zero concurrency bound.
    pub fn dispatch(&self, request: ScrapeRequest) -> Result<ScrapeJob> {
        request.validate()?;

        let job_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let total = request.targets().len();

        tracing::info!(
            job = %job_id,
            item = request.item_name(),
            wear = %request.wear(),
            marketplaces = total,
            max_concurrency = request.max_concurrency(),
            "dispatching scrape job"
        );

        let (report_tx, report_rx) = mpsc::channel(total);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let aggregator = Aggregator::new(
            job_id,
            request.targets().iter().map(|t| t.marketplace_id.clone()),
            self.store.clone(),
            event_tx,
            request.persistence_timeout(),
        );
        let outcome = tokio::spawn(aggregator.run(report_rx));

        tokio::spawn(
            self.clone()
                .schedule(job_id, request, report_tx, cancel.clone()),
        );

        Ok(ScrapeJob {
            id: job_id,
            events: event_rx,
            cancel,
            outcome,
        })
    }

    /// Start extractions in request order, at most `max_concurrency` at a
    /// time.
    async fn schedule(
        self,
        job_id: Uuid,
        request: ScrapeRequest,
        reports: mpsc::Sender<MarketplaceReport>,
        cancel: CancellationToken,
    ) {
        let semaphore = Arc::new(Semaphore::new(request.max_concurrency()));
        let query = ListingQuery::new(request.item_name(), request.wear());
        let settings = request.extraction_settings();

        for target in request.targets() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                tracing::debug!(job = %job_id, marketplace = %target.marketplace_id, "cancelled while queued");
                send_report(&reports, MarketplaceReport::cancelled(target)).await;
                continue;
            };

            let machine = ExtractionMachine::new(
                target.clone(),
                query.clone(),
                self.provider.clone(),
                self.extractors.get(&target.marketplace_id),
                settings,
            );
            let token = cancel.child_token();
            let reports = reports.clone();
            let target = target.clone();

            tokio::spawn(async move {
                let report = run_isolated(machine, token, &target).await;
                drop(permit);
                send_report(&reports, report).await;
            });
        }
    }
}

/// Run a machine, turning a panic into a failed report so the job still
/// completes.
async fn run_isolated(
    machine: ExtractionMachine,
    cancel: CancellationToken,
    target: &MarketplaceTarget,
) -> MarketplaceReport {
    match AssertUnwindSafe(machine.run(cancel)).catch_unwind().await {
        Ok(report) => report,
        Err(_) => {
            tracing::error!(marketplace = %target.marketplace_id, "extraction task panicked");
            MarketplaceReport {
                marketplace_id: target.marketplace_id.clone(),
                url: target.url.clone(),
                attempts: 0,
                result: Err(ExtractionError::AcquisitionError(
                    "extraction task panicked".to_string(),
                )),
            }
        }
    }
}

async fn send_report(reports: &mpsc::Sender<MarketplaceReport>, report: MarketplaceReport) {
    if reports.send(report).await.is_err() {
        tracing::debug!("aggregator gone, report dropped");
    }
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("extractors", &self.extractors)
            .finish_non_exhaustive()
    }
}

/// Handle to a running scrape job.
#[derive(Debug)]
pub struct ScrapeJob {
    id: Uuid,
    events: mpsc::UnboundedReceiver<JobEvent>,
    cancel: CancellationToken,
    outcome: JoinHandle<JobOutcome>,
}

impl ScrapeJob {
    /// Job id, as logged under the `job` field.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the job has finished and every event was
    /// delivered.
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Stop the job. Every marketplace still reports, as `Cancelled` if it
    /// had not finished.
    pub fn cancel(&self) {
        tracing::info!(job = %self.id, "cancelling scrape job");
        self.cancel.cancel();
    }

    /// Token that cancels this job when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the final outcome.
    ///
    /// # Errors
    /// Returns `ScanError::JobAborted` if the aggregator task did not finish.
    pub async fn wait(self) -> Result<JobOutcome> {
        self.outcome
            .await
            .map_err(|e| ScanError::JobAborted(e.to_string()))
    }
}
