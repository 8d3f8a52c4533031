//! Fulfillment report types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grouping dimension for fulfillment reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportDimension {
    /// Group occurrences by subscribing customer
    Customer,
    /// Group occurrences by fulfilling vendor
    Vendor,
    /// Group occurrences by delivering (or assigned) milkman
    Milkman,
}

impl std::fmt::Display for ReportDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Milkman => write!(f, "milkman"),
        }
    }
}

impl std::str::FromStr for ReportDimension {
    type Err = ParseDimensionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "milkman" => Ok(Self::Milkman),
            other => Err(ParseDimensionError(other.to_string())),
        }
    }
}

/// Error parsing a report dimension string
#[derive(Debug, thiserror::Error)]
#[error("unknown report dimension: {0}")]
pub struct ParseDimensionError(pub String);

/// Occurrence counts and quantity totals for one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Occurrences resolved by an accepted delivery event
    pub delivered: u64,
    /// Occurrences whose date elapsed without a matching event
    pub missed: u64,
    /// Occurrences suppressed by holidays, pauses, or admin skips
    pub skipped: u64,
    /// Occurrences still awaiting resolution (today or later)
    pub pending: u64,
    /// Total expected quantity across counted occurrences, in milliliters
    pub expected_ml: i64,
    /// Total quantity actually delivered, in milliliters
    pub delivered_ml: i64,
}

impl ReportRow {
    /// Total number of occurrences counted in this row
    pub fn total(&self) -> u64 {
        self.delivered + self.missed + self.skipped + self.pending
    }
}

/// A fulfillment summary over a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentReport {
    /// First date of the range (inclusive)
    pub from: NaiveDate,
    /// Last date of the range (inclusive)
    pub to: NaiveDate,
    /// Day the report was computed against; unresolved occurrences on or
    /// after it count `pending`
    pub as_of: NaiveDate,
    /// Grouping dimension
    pub dimension: ReportDimension,
    /// One row per group key (customer/vendor/milkman id)
    pub rows: std::collections::BTreeMap<Uuid, ReportRow>,
}
