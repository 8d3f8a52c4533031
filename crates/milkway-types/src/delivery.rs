//! Reported delivery events
//!
//! Events are append-only. A correction is a new event carrying a
//! `supersedes` reference, never an in-place edit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MilkmanId, SubscriptionId};

/// Unique delivery event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryEventId(pub Uuid);

impl DeliveryEventId {
    /// Create a new random delivery event ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a delivery event ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DeliveryEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DeliveryEventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A milkman-reported delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    /// Event ID
    pub id: DeliveryEventId,
    /// Subscription the delivery was made against
    pub subscription_id: SubscriptionId,
    /// Reporting milkman
    pub milkman_id: MilkmanId,
    /// Instant the delivery was reported
    pub delivered_at: DateTime<Utc>,
    /// Calendar date the delivery was made on
    pub delivered_on: NaiveDate,
    /// Delivered quantity, in milliliters
    pub quantity_ml: i64,
    /// Free-form note from the field
    pub note: Option<String>,
    /// Event this one corrects, if any
    pub supersedes: Option<DeliveryEventId>,
}
