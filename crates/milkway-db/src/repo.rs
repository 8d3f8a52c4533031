//! Repository traits
//!
//! Define async repository interfaces for database operations. The
//! fulfillment core depends only on these traits; Postgres and the in-memory
//! test repositories implement them.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Find non-cancelled subscriptions whose term overlaps the date range
    async fn list_active_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<SubscriptionRow>>;

    /// Find all subscriptions whose term overlaps the date range, cancelled
    /// included (cancelled terms are retained for reporting)
    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate)
        -> DbResult<Vec<SubscriptionRow>>;

    /// Find all subscriptions for a customer, cancelled included
    async fn list_by_customer(&self, customer_id: Uuid) -> DbResult<Vec<SubscriptionRow>>;

    /// Find all subscriptions for a vendor, cancelled included
    async fn list_by_vendor(&self, vendor_id: Uuid) -> DbResult<Vec<SubscriptionRow>>;

    /// Create a new subscription
    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow>;

    /// Apply a status/pause/end-date update if the stored version matches.
    ///
    /// Returns `false` when the version check fails (concurrent writer won).
    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        update: SubscriptionUpdate,
    ) -> DbResult<bool>;
}

/// Vendor calendar repository trait
#[async_trait]
pub trait CalendarRepository: Send + Sync {
    /// Holidays for a vendor inside the date range (inclusive bounds)
    async fn holidays_in_range(
        &self,
        vendor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<VendorHolidayRow>>;

    /// Declare a non-delivery date (idempotent upsert)
    async fn add_holiday(&self, holiday: VendorHolidayRow) -> DbResult<()>;

    /// Remove a non-delivery date; returns `false` if it did not exist
    async fn remove_holiday(&self, vendor_id: Uuid, date: NaiveDate) -> DbResult<bool>;
}

/// Delivery event repository trait (append-only)
#[async_trait]
pub trait DeliveryEventRepository: Send + Sync {
    /// Find a delivery event by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DeliveryEventRow>>;

    /// Append a new delivery event
    async fn create(&self, event: CreateDeliveryEvent) -> DbResult<DeliveryEventRow>;

    /// Events reported against a subscription inside the date range
    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DeliveryEventRow>>;

    /// All events delivered inside the date range, across subscriptions
    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate)
        -> DbResult<Vec<DeliveryEventRow>>;
}

/// Occurrence resolution repository trait
#[async_trait]
pub trait ResolutionRepository: Send + Sync {
    /// Find the resolution for one occurrence
    async fn find(&self, subscription_id: Uuid, date: NaiveDate)
        -> DbResult<Option<ResolutionRow>>;

    /// Atomically insert a resolution unless one exists for the occurrence.
    ///
    /// Returns `false` when the occurrence was already resolved — the caller
    /// lost the single-writer race and must treat the attempt as a conflict.
    async fn insert_if_absent(&self, resolution: CreateResolution) -> DbResult<bool>;

    /// Resolutions for one subscription inside the date range
    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<ResolutionRow>>;

    /// All resolutions inside the date range, across subscriptions
    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<ResolutionRow>>;
}

/// Unmatched event queue repository trait
#[async_trait]
pub trait UnmatchedRepository: Send + Sync {
    /// Queue an event for manual reconciliation
    async fn create(&self, unmatched: CreateUnmatchedEvent) -> DbResult<UnmatchedEventRow>;

    /// Find a queue entry by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UnmatchedEventRow>>;

    /// All open queue entries, oldest first
    async fn list_open(&self) -> DbResult<Vec<UnmatchedEventRow>>;

    /// Close a queue entry; returns `false` if unknown or already closed
    async fn close(&self, id: Uuid) -> DbResult<bool>;
}

/// Audit log repository trait (append-only)
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append an audit entry
    async fn append(&self, entry: CreateAuditEntry) -> DbResult<()>;

    /// Latest audit entries for a subscription, newest first
    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> DbResult<Vec<AuditRow>>;
}

/// Existence checks against the user directory
///
/// The directory itself (registration, credentials) is owned elsewhere; the
/// fulfillment engine only ever asks whether an identifier is known.
#[async_trait]
pub trait PartyDirectory: Send + Sync {
    /// Whether the customer ID is known
    async fn customer_exists(&self, id: Uuid) -> DbResult<bool>;

    /// Whether the vendor ID is known
    async fn vendor_exists(&self, id: Uuid) -> DbResult<bool>;

    /// Whether the milkman ID is known
    async fn milkman_exists(&self, id: Uuid) -> DbResult<bool>;
}
