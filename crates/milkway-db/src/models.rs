//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! Recurrence rules and pause windows are stored as JSONB columns.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub use sqlx::types::Json;

use milkway_types::{PauseWindow, Recurrence, Subscription, SubscriptionStatus};

use crate::error::DbError;

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub milkman_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity_ml: i64,
    pub recurrence: Json<Recurrence>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub pauses: Json<Vec<PauseWindow>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// Convert to the domain subscription type
    pub fn to_domain(&self) -> Result<Subscription, DbError> {
        let status: SubscriptionStatus = self
            .status
            .parse()
            .map_err(|e| DbError::Decode(format!("subscription {}: {e}", self.id)))?;

        Ok(Subscription {
            id: self.id.into(),
            customer_id: self.customer_id.into(),
            vendor_id: self.vendor_id.into(),
            milkman_id: self.milkman_id.map(Into::into),
            product_id: self.product_id.into(),
            quantity_ml: self.quantity_ml,
            recurrence: self.recurrence.0.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            status,
            pauses: self.pauses.0.clone(),
            version: self.version,
        })
    }
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub milkman_id: Option<Uuid>,
    pub product_id: Uuid,
    pub quantity_ml: i64,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Mutable subscription fields, applied through `update_if_version`
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
    pub pauses: Vec<PauseWindow>,
    pub end_date: Option<NaiveDate>,
}

/// Delivery event row from the database (append-only)
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryEventRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub milkman_id: Uuid,
    pub delivered_at: DateTime<Utc>,
    pub delivered_on: NaiveDate,
    pub quantity_ml: i64,
    pub note: Option<String>,
    pub supersedes: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Create delivery event input
#[derive(Debug, Clone)]
pub struct CreateDeliveryEvent {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub milkman_id: Uuid,
    pub delivered_at: DateTime<Utc>,
    pub delivered_on: NaiveDate,
    pub quantity_ml: i64,
    pub note: Option<String>,
    pub supersedes: Option<Uuid>,
}

/// Occurrence resolution row, keyed uniquely by (subscription_id, date)
///
/// The unique key is what serializes concurrent resolution attempts: the
/// second insert for the same occurrence does not land.
#[derive(Debug, Clone, FromRow)]
pub struct ResolutionRow {
    pub subscription_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
    pub event_id: Option<Uuid>,
    pub resolved_by: String,
    pub resolved_at: DateTime<Utc>,
}

/// Create resolution input
#[derive(Debug, Clone)]
pub struct CreateResolution {
    pub subscription_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
    pub event_id: Option<Uuid>,
    pub resolved_by: String,
}

/// Unmatched delivery event queued for manual reconciliation
#[derive(Debug, Clone, FromRow)]
pub struct UnmatchedEventRow {
    pub id: Uuid,
    pub event_id: Uuid,
    pub subscription_id: Uuid,
    pub reason: String,
    pub open: bool,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Create unmatched event input
#[derive(Debug, Clone)]
pub struct CreateUnmatchedEvent {
    pub id: Uuid,
    pub event_id: Uuid,
    pub subscription_id: Uuid,
    pub reason: String,
}

/// Audit log row (append-only)
#[derive(Debug, Clone, FromRow)]
pub struct AuditRow {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub date: Option<NaiveDate>,
    pub event_id: Option<Uuid>,
    pub action: String,
    pub actor: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Create audit entry input
#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub subscription_id: Uuid,
    pub date: Option<NaiveDate>,
    pub event_id: Option<Uuid>,
    pub action: String,
    pub actor: String,
    pub detail: Option<String>,
}

/// Vendor holiday row
#[derive(Debug, Clone, FromRow)]
pub struct VendorHolidayRow {
    pub vendor_id: Uuid,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

impl VendorHolidayRow {
    /// Convert to the domain holiday type
    pub fn to_domain(&self) -> milkway_types::VendorHoliday {
        milkway_types::VendorHoliday {
            vendor_id: self.vendor_id.into(),
            date: self.date,
            reason: self.reason.clone(),
        }
    }
}
