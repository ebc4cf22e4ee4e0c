//! Audit record of an attempt to close an invoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// How a close attempt ended. `InProgress` rows that are never finalised and
/// `CompensationFailed` rows mark invoices whose status may disagree with stock.
/// `Rejected` attempts never changed the invoice, e.g. when another close won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseOutcome {
    InProgress,
    Closed,
    Reopened,
    Rejected,
    CompensationFailed,
}

impl CloseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseOutcome::InProgress => "in_progress",
            CloseOutcome::Closed => "closed",
            CloseOutcome::Reopened => "reopened",
            CloseOutcome::Rejected => "rejected",
            CloseOutcome::CompensationFailed => "compensation_failed",
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, CloseOutcome::InProgress | CloseOutcome::CompensationFailed)
    }
}

#[derive(Debug, Error)]
#[error("unknown close outcome: {0}")]
pub struct UnknownOutcome(pub String);

impl TryFrom<String> for CloseOutcome {
    type Error = UnknownOutcome;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "in_progress" => Ok(CloseOutcome::InProgress),
            "closed" => Ok(CloseOutcome::Closed),
            "reopened" => Ok(CloseOutcome::Reopened),
            "rejected" => Ok(CloseOutcome::Rejected),
            "compensation_failed" => Ok(CloseOutcome::CompensationFailed),
            _ => Err(UnknownOutcome(s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CloseAttempt {
    pub id: Uuid,
    pub invoice_code: String,
    #[sqlx(try_from = "String")]
    pub outcome: CloseOutcome,
    pub detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unfinished_and_failed_compensations_are_gaps() {
        assert!(CloseOutcome::InProgress.is_gap());
        assert!(CloseOutcome::CompensationFailed.is_gap());
        assert!(!CloseOutcome::Closed.is_gap());
        assert!(!CloseOutcome::Reopened.is_gap());
        assert!(!CloseOutcome::Rejected.is_gap());
    }

    #[test]
    fn stored_text_maps_back_to_outcome() {
        let parsed = CloseOutcome::try_from(CloseOutcome::Rejected.as_str().to_string()).unwrap();
        assert_eq!(parsed, CloseOutcome::Rejected);
        assert!(CloseOutcome::try_from("aborted".to_string()).is_err());
    }
}
