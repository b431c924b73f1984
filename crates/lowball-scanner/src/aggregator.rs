//! Single-writer progress and result aggregation for one job.

use crate::error::ExtractionError;
use crate::events::{JobEvent, OutcomeKind};
use crate::extraction::MarketplaceReport;
use crate::outcome::{JobOutcome, MarketplaceEntry};
use crate::store::ResultStore;
use lowball_core::{MarketplaceId, PriceRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Owns a job's [`JobOutcome`]. Every write goes through [`Aggregator::run`].
pub(crate) struct Aggregator {
    job_id: Uuid,
    expected: HashSet<MarketplaceId>,
    outcome: JobOutcome,
    store: Arc<dyn ResultStore>,
    events: mpsc::UnboundedSender<JobEvent>,
    persistence_timeout: Duration,
    completed: bool,
}

impl Aggregator {
    pub(crate) fn new(
        job_id: Uuid,
        expected: impl IntoIterator<Item = MarketplaceId>,
        store: Arc<dyn ResultStore>,
        events: mpsc::UnboundedSender<JobEvent>,
        persistence_timeout: Duration,
    ) -> Self {
        let expected: HashSet<_> = expected.into_iter().collect();
        Self {
            job_id,
            outcome: JobOutcome::new(expected.len()),
            expected,
            store,
            events,
            persistence_timeout,
            completed: false,
        }
    }

    /// Consume reports until every sender is gone, returning the outcome.
    ///
    /// `Completed` is emitted as soon as the last expected marketplace
    /// reports. Anything arriving afterwards is dropped with a warning.
    pub(crate) async fn run(mut self, mut reports: mpsc::Receiver<MarketplaceReport>) -> JobOutcome {
        while let Some(report) = reports.recv().await {
            self.handle(report).await;
        }

        if !self.completed {
            tracing::error!(
                job = %self.job_id,
                reported = self.outcome.completed_count(),
                total = self.outcome.total_count(),
                "report channel closed before every marketplace reported"
            );
        }
        self.outcome
    }

    async fn handle(&mut self, report: MarketplaceReport) {
        if self.completed {
            tracing::warn!(
                job = %self.job_id,
                marketplace = %report.marketplace_id,
                "report after job completion dropped"
            );
            return;
        }
        if !self.expected.contains(&report.marketplace_id) {
            tracing::warn!(
                job = %self.job_id,
                marketplace = %report.marketplace_id,
                "report for unknown marketplace dropped"
            );
            return;
        }
        if self.outcome.contains(&report.marketplace_id) {
            tracing::warn!(
                job = %self.job_id,
                marketplace = %report.marketplace_id,
                "duplicate report dropped"
            );
            return;
        }

        let (kind, persistence_error) = match &report.result {
            Ok(record) => match self.persist(record).await {
                Ok(()) => (OutcomeKind::Succeeded, None),
                Err(e) => (OutcomeKind::from(&e), Some(e)),
            },
            Err(e) => (OutcomeKind::from(e), None),
        };

        let entry = MarketplaceEntry {
            marketplace_id: report.marketplace_id.clone(),
            url: report.url.clone(),
            attempts: report.attempts,
            result: report.result,
            persistence_error: persistence_error.as_ref().map(ToString::to_string),
        };
        let error_message = match (&entry.result, &persistence_error) {
            (Err(e), _) | (Ok(_), Some(e)) => Some(e.to_string()),
            (Ok(_), None) => None,
        };
        self.outcome.insert(entry);

        self.emit(JobEvent::Progress {
            completed_count: self.outcome.completed_count(),
            total_count: self.outcome.total_count(),
            marketplace_id: report.marketplace_id.clone(),
            outcome_kind: kind,
        });
        if let Some(message) = error_message {
            self.emit(JobEvent::Error {
                marketplace_id: report.marketplace_id,
                url: report.url,
                message,
            });
        }

        if self.outcome.is_complete() {
            self.completed = true;
            tracing::info!(
                job = %self.job_id,
                succeeded = self.outcome.records().len(),
                failed = self.outcome.failures().len(),
                "scrape job completed"
            );
            self.emit(JobEvent::Completed {
                outcome: self.outcome.clone(),
            });
        }
    }

    async fn persist(&self, record: &PriceRecord) -> Result<(), ExtractionError> {
        match tokio::time::timeout(self.persistence_timeout, self.store.append(record)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!(
                    job = %self.job_id,
                    marketplace = %record.marketplace_id,
                    "failed to persist price record: {}",
                    e
                );
                Err(ExtractionError::PersistenceError(e.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    job = %self.job_id,
                    marketplace = %record.marketplace_id,
                    timeout = ?self.persistence_timeout,
                    "persisting price record timed out"
                );
                Err(ExtractionError::PersistenceError(format!(
                    "append timed out after {:?}",
                    self.persistence_timeout
                )))
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(job = %self.job_id, "event receiver dropped");
        }
    }
}
