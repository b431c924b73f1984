//! Events streamed to the caller while a job runs.

use crate::error::ExtractionError;
use crate::outcome::JobOutcome;
use lowball_core::{MarketplaceId, PriceRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a marketplace finished, as shown in progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    /// Price extracted and stored
    Succeeded,
    /// Price extracted but the store append failed
    PersistenceError,
    AcquisitionError,
    ExtractionTimeout,
    InvalidPrice,
    Cancelled,
}

impl OutcomeKind {
    /// Whether the marketplace produced a price record.
    #[must_use]
    pub fn has_record(&self) -> bool {
        matches!(self, Self::Succeeded | Self::PersistenceError)
    }
}

impl From<&ExtractionError> for OutcomeKind {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::AcquisitionError(_) => Self::AcquisitionError,
            ExtractionError::ExtractionTimeout => Self::ExtractionTimeout,
            ExtractionError::InvalidPrice(_) => Self::InvalidPrice,
            ExtractionError::PersistenceError(_) => Self::PersistenceError,
            ExtractionError::Cancelled => Self::Cancelled,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A job event.
///
/// Per job: one `Progress` per marketplace with a strictly increasing
/// `completed_count`, an `Error` after each failed marketplace's progress,
/// and a single `Completed` last.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobEvent {
    Progress {
        completed_count: usize,
        total_count: usize,
        marketplace_id: MarketplaceId,
        outcome_kind: OutcomeKind,
    },
    Error {
        marketplace_id: MarketplaceId,
        url: String,
        message: String,
    },
    Completed {
        outcome: JobOutcome,
    },
}

impl JobEvent {
    /// Whether this is the terminal event.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Records carried by a `Completed` event.
    #[must_use]
    pub fn records(&self) -> Vec<&PriceRecord> {
        match self {
            Self::Completed { outcome } => outcome.records(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_wire_format() {
        let event = JobEvent::Progress {
            completed_count: 2,
            total_count: 3,
            marketplace_id: MarketplaceId::new("steam").unwrap(),
            outcome_kind: OutcomeKind::PersistenceError,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["completedCount"], 2);
        assert_eq!(json["totalCount"], 3);
        assert_eq!(json["marketplaceId"], "steam");
        assert_eq!(json["outcomeKind"], "PersistenceError");
        assert!(!event.is_completed());
    }

    #[test]
    fn test_kind_from_error() {
        assert_eq!(
            OutcomeKind::from(&ExtractionError::InvalidPrice("x".to_string())),
            OutcomeKind::InvalidPrice
        );
        assert_eq!(
            OutcomeKind::from(&ExtractionError::Cancelled),
            OutcomeKind::Cancelled
        );
        assert!(OutcomeKind::PersistenceError.has_record());
        assert!(!OutcomeKind::ExtractionTimeout.has_record());
    }
}
