//! Subscription types and recurrence rules

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CustomerId, MilkmanId, ProductId, VendorId};

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a subscription ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SubscriptionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Subscription lifecycle status
///
/// `Active -> Paused -> Active` is resumable; `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Deliveries are expected per the recurrence rule
    Active,
    /// Deliveries suspended; the subscription can resume
    Paused,
    /// Terminated; retained for reporting only
    Cancelled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Error parsing a subscription status string
#[derive(Debug, thiserror::Error)]
#[error("unknown subscription status: {0}")]
pub struct ParseStatusError(pub String);

/// Recurrence rule deciding which calendar dates a subscription delivers on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    /// Every day
    Daily,
    /// Every second day, counted from the anchor date
    AlternateDays {
        /// First delivery date of the cadence
        anchor: NaiveDate,
    },
    /// On the listed weekdays each week
    Weekly {
        /// Delivery weekdays; must be non-empty for an active subscription
        weekdays: Vec<Weekday>,
    },
}

impl Recurrence {
    /// Whether the rule yields a delivery on `date`
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::Daily => true,
            Self::AlternateDays { anchor } => {
                let days = (date - *anchor).num_days();
                days >= 0 && days % 2 == 0
            }
            Self::Weekly { weekdays } => weekdays.contains(&date.weekday()),
        }
    }

    /// Whether the rule yields at least one occurrence per calendar week
    pub fn weekly_coverage(&self) -> bool {
        match self {
            Self::Daily | Self::AlternateDays { .. } => true,
            Self::Weekly { weekdays } => !weekdays.is_empty(),
        }
    }
}

/// A customer-declared delivery suspension window, end date inclusive
///
/// Open-ended pauses are not representable: both bounds are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseWindow {
    /// First suspended date
    pub from: NaiveDate,
    /// Last suspended date (inclusive)
    pub until: NaiveDate,
}

impl PauseWindow {
    /// Create a pause window; `until` must not precede `from`
    pub fn new(from: NaiveDate, until: NaiveDate) -> Result<Self, InvalidSubscription> {
        if until < from {
            return Err(InvalidSubscription::PauseEndsBeforeStart { from, until });
        }
        Ok(Self { from, until })
    }

    /// Whether `date` falls inside the window
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.until
    }
}

/// A customer's recurring milk delivery subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: SubscriptionId,
    /// Subscribing customer
    pub customer_id: CustomerId,
    /// Vendor fulfilling the subscription
    pub vendor_id: VendorId,
    /// Milkman assigned to the route, when known
    pub milkman_id: Option<MilkmanId>,
    /// Delivered product
    pub product_id: ProductId,
    /// Quantity per delivery, in milliliters
    pub quantity_ml: i64,
    /// Recurrence rule
    pub recurrence: Recurrence,
    /// First delivery date
    pub start_date: NaiveDate,
    /// Last delivery date (inclusive), if bounded
    pub end_date: Option<NaiveDate>,
    /// Lifecycle status
    pub status: SubscriptionStatus,
    /// Delivery suspension windows
    pub pauses: Vec<PauseWindow>,
    /// Optimistic concurrency version
    pub version: i64,
}

impl Subscription {
    /// Validate the structural invariants of the subscription
    pub fn validate(&self) -> Result<(), InvalidSubscription> {
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(InvalidSubscription::EndsBeforeStart {
                    start: self.start_date,
                    end,
                });
            }
        }
        if self.quantity_ml <= 0 {
            return Err(InvalidSubscription::NonPositiveQuantity(self.quantity_ml));
        }
        if self.status == SubscriptionStatus::Active && !self.recurrence.weekly_coverage() {
            return Err(InvalidSubscription::EmptyRecurrence);
        }
        Ok(())
    }

    /// Whether `date` falls inside the subscription term
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && self.end_date.is_none_or(|end| date <= end)
    }

    /// Whether `date` falls inside any pause window
    pub fn paused_on(&self, date: NaiveDate) -> bool {
        self.pauses.iter().any(|w| w.contains(date))
    }
}

/// Structural subscription invariant violations
#[derive(Debug, thiserror::Error)]
pub enum InvalidSubscription {
    /// End date precedes start date
    #[error("end date {end} precedes start date {start}")]
    EndsBeforeStart {
        /// Subscription start
        start: NaiveDate,
        /// Offending end date
        end: NaiveDate,
    },

    /// Pause window end precedes its start
    #[error("pause until {until} precedes pause from {from}")]
    PauseEndsBeforeStart {
        /// Window start
        from: NaiveDate,
        /// Offending window end
        until: NaiveDate,
    },

    /// Quantity must be positive
    #[error("quantity must be positive, got {0} ml")]
    NonPositiveQuantity(i64),

    /// Active subscription with a weekly rule and no weekdays
    #[error("active subscription requires at least one delivery per week")]
    EmptyRecurrence,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn subscription(recurrence: Recurrence) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            milkman_id: None,
            product_id: ProductId::new(),
            quantity_ml: 1_000,
            recurrence,
            start_date: date(2025, 6, 1),
            end_date: None,
            status: SubscriptionStatus::Active,
            pauses: Vec::new(),
            version: 1,
        }
    }

    #[test]
    fn test_daily_matches_every_date() {
        let rule = Recurrence::Daily;
        assert!(rule.matches(date(2025, 6, 1)));
        assert!(rule.matches(date(2025, 6, 2)));
    }

    #[test]
    fn test_alternate_days_from_anchor() {
        let rule = Recurrence::AlternateDays {
            anchor: date(2025, 6, 1),
        };
        assert!(rule.matches(date(2025, 6, 1)));
        assert!(!rule.matches(date(2025, 6, 2)));
        assert!(rule.matches(date(2025, 6, 3)));
        // Dates before the anchor never match
        assert!(!rule.matches(date(2025, 5, 31)));
        assert!(!rule.matches(date(2025, 5, 30)));
    }

    #[test]
    fn test_weekly_matches_member_weekdays() {
        let rule = Recurrence::Weekly {
            weekdays: vec![Weekday::Mon, Weekday::Fri],
        };
        // 2025-06-02 is a Monday
        assert!(rule.matches(date(2025, 6, 2)));
        assert!(!rule.matches(date(2025, 6, 3)));
        assert!(rule.matches(date(2025, 6, 6)));
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut sub = subscription(Recurrence::Daily);
        sub.end_date = Some(date(2025, 5, 1));
        assert!(matches!(
            sub.validate(),
            Err(InvalidSubscription::EndsBeforeStart { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_weekly_rule() {
        let sub = subscription(Recurrence::Weekly {
            weekdays: Vec::new(),
        });
        assert!(matches!(
            sub.validate(),
            Err(InvalidSubscription::EmptyRecurrence)
        ));
    }

    #[test]
    fn test_cancelled_subscription_allows_empty_rule() {
        let mut sub = subscription(Recurrence::Weekly {
            weekdays: Vec::new(),
        });
        sub.status = SubscriptionStatus::Cancelled;
        assert!(sub.validate().is_ok());
    }

    #[test]
    fn test_pause_window_rejects_inverted_bounds() {
        assert!(PauseWindow::new(date(2025, 6, 10), date(2025, 6, 5)).is_err());
    }

    #[test]
    fn test_covers_respects_term_bounds() {
        let mut sub = subscription(Recurrence::Daily);
        sub.end_date = Some(date(2025, 6, 30));
        assert!(!sub.covers(date(2025, 5, 31)));
        assert!(sub.covers(date(2025, 6, 1)));
        assert!(sub.covers(date(2025, 6, 30)));
        assert!(!sub.covers(date(2025, 7, 1)));
    }

    #[test]
    fn test_recurrence_serde_roundtrip() {
        let rule = Recurrence::Weekly {
            weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        };
        let json = serde_json::to_string(&rule).unwrap();
        let back: Recurrence = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, back);
    }
}
