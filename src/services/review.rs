//! Manual review of a transaction.
//!
//! A transaction is unreviewed until the first decision, then reviewed safe or
//! reviewed fraud. Any later decision overwrites the previous one; nothing is
//! locked and no history is kept beyond the latest audit record.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use crate::models::transaction::{ManualReview, ReviewMark, RiskLevel};
use crate::services::validation::ValidationError;

/// Lowest score a transaction keeps after being marked as fraud.
pub const FRAUD_RISK_FLOOR: i32 = 90;
/// Highest score a transaction keeps after being marked as safe.
pub const SAFE_RISK_CEILING: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    MarkSafe,
    MarkFraud,
}

impl FromStr for ReviewAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark_safe" => Ok(ReviewAction::MarkSafe),
            "mark_fraud" => Ok(ReviewAction::MarkFraud),
            other => Err(ValidationError(format!(
                "Invalid action '{}'. Must be 'mark_safe' or 'mark_fraud'",
                other
            ))),
        }
    }
}

impl ReviewAction {
    pub fn mark(self) -> ReviewMark {
        match self {
            ReviewAction::MarkSafe => ReviewMark::Safe,
            ReviewAction::MarkFraud => ReviewMark::Fraud,
        }
    }

    /// Floor for fraud, ceiling for safe. The update raises the stored score
    /// to the floor or lowers it to the ceiling, never the other way.
    pub fn risk_score_bound(self) -> i32 {
        match self {
            ReviewAction::MarkSafe => SAFE_RISK_CEILING,
            ReviewAction::MarkFraud => FRAUD_RISK_FLOOR,
        }
    }
}

/// Everything a review writes except the clamped score, which depends on the
/// stored value and is computed inside the update.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDecision {
    pub action: ReviewAction,
    pub fraud_detected: bool,
    pub risk_level: RiskLevel,
    pub manual_review: ManualReview,
}

impl ReviewDecision {
    pub fn new(
        action: ReviewAction,
        notes: Option<String>,
        retrain_model: Option<bool>,
        now: DateTime<Utc>,
    ) -> Self {
        let (fraud_detected, risk_level) = match action {
            ReviewAction::MarkFraud => (true, RiskLevel::High),
            ReviewAction::MarkSafe => (false, RiskLevel::Low),
        };

        Self {
            action,
            fraud_detected,
            risk_level,
            manual_review: ManualReview {
                reviewed: true,
                reviewed_at: now,
                marked_as: action.mark(),
                notes: notes.unwrap_or_default(),
                retrain_model: retrain_model != Some(false),
            },
        }
    }
}
