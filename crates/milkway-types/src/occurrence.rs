//! Expected delivery occurrences
//!
//! Occurrences are derived from a subscription's recurrence rule; they are
//! never stored as rows of their own. Only their resolutions persist.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::SubscriptionId;

/// Fulfillment status of one expected delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// Expected, not yet resolved
    Pending,
    /// Resolved by an accepted delivery event
    Delivered,
    /// Date elapsed with no matching event; terminal
    Missed,
    /// Suppressed by a vendor holiday or pause window, or skipped by an admin
    Skipped,
}

impl std::fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Missed => write!(f, "missed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for OccurrenceStatus {
    type Err = ParseOccurrenceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "missed" => Ok(Self::Missed),
            "skipped" => Ok(Self::Skipped),
            other => Err(ParseOccurrenceStatusError(other.to_string())),
        }
    }
}

/// Error parsing an occurrence status string
#[derive(Debug, thiserror::Error)]
#[error("unknown occurrence status: {0}")]
pub struct ParseOccurrenceStatusError(pub String);

/// One expected delivery instance for a specific date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Owning subscription
    pub subscription_id: SubscriptionId,
    /// Expected delivery date
    pub date: NaiveDate,
    /// Expected quantity, in milliliters
    pub quantity_ml: i64,
    /// Fulfillment status
    pub status: OccurrenceStatus,
}

impl Occurrence {
    /// Whether this occurrence still awaits a delivery event
    pub fn is_open(&self) -> bool {
        self.status == OccurrenceStatus::Pending
    }
}
