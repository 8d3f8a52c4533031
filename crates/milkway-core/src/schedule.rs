//! Calendar/Schedule store
//!
//! Read-mostly access to vendor delivery calendars and the subscription
//! book. Holiday lookups are cached per (vendor, range) with a short TTL;
//! holiday writes invalidate the vendor's cached ranges.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use moka::future::Cache;
use uuid::Uuid;

use milkway_db::{
    CalendarRepository, PartyDirectory, SubscriptionRepository, VendorHolidayRow,
};
use milkway_types::{Subscription, SubscriptionId, VendorHoliday, VendorId};

use crate::config::FulfillmentConfig;
use crate::error::FulfillmentError;

/// Cached vendor holiday lookups plus subscription reads
pub struct ScheduleStore<C, S, P>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
{
    calendars: Arc<C>,
    subscriptions: Arc<S>,
    directory: Arc<P>,
    /// Cache of (vendor, from, to) -> holiday set
    holiday_cache: Cache<(Uuid, NaiveDate, NaiveDate), Arc<BTreeSet<NaiveDate>>>,
}

impl<C, S, P> Clone for ScheduleStore<C, S, P>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
{
    fn clone(&self) -> Self {
        Self {
            calendars: Arc::clone(&self.calendars),
            subscriptions: Arc::clone(&self.subscriptions),
            directory: Arc::clone(&self.directory),
            holiday_cache: self.holiday_cache.clone(),
        }
    }
}

impl<C, S, P> ScheduleStore<C, S, P>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
{
    /// Create a schedule store
    pub fn new(
        calendars: Arc<C>,
        subscriptions: Arc<S>,
        directory: Arc<P>,
        config: &FulfillmentConfig,
    ) -> Self {
        Self {
            calendars,
            subscriptions,
            directory,
            holiday_cache: Cache::builder()
                .time_to_live(config.holiday_cache_ttl)
                .max_capacity(config.holiday_cache_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Non-delivery dates for a vendor inside the range (inclusive)
    pub async fn vendor_holidays(
        &self,
        vendor_id: VendorId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Arc<BTreeSet<NaiveDate>>, FulfillmentError> {
        let cache_key = (vendor_id.0, from, to);
        if let Some(holidays) = self.holiday_cache.get(&cache_key).await {
            return Ok(holidays);
        }

        if !self.directory.vendor_exists(vendor_id.0).await? {
            return Err(FulfillmentError::NotFound("vendor"));
        }

        let rows = self.calendars.holidays_in_range(vendor_id.0, from, to).await?;
        let holidays: Arc<BTreeSet<NaiveDate>> =
            Arc::new(rows.into_iter().map(|r| r.date).collect());

        self.holiday_cache.insert(cache_key, Arc::clone(&holidays)).await;
        Ok(holidays)
    }

    /// Non-cancelled subscriptions whose term overlaps the range
    pub async fn active_subscriptions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        let rows = self.subscriptions.list_active_in_range(from, to).await?;
        rows.iter()
            .map(|r| r.to_domain().map_err(Into::into))
            .collect()
    }

    /// All subscriptions overlapping the range, cancelled included
    pub async fn all_subscriptions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        let rows = self.subscriptions.list_in_range(from, to).await?;
        rows.iter()
            .map(|r| r.to_domain().map_err(Into::into))
            .collect()
    }

    /// Load one subscription or fail with `NotFound`
    pub async fn subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Subscription, FulfillmentError> {
        let row = self
            .subscriptions
            .find_by_id(id.0)
            .await?
            .ok_or(FulfillmentError::NotFound("subscription"))?;
        Ok(row.to_domain()?)
    }

    /// Declare a vendor non-delivery date
    pub async fn add_holiday(
        &self,
        holiday: VendorHoliday,
    ) -> Result<(), FulfillmentError> {
        if !self.directory.vendor_exists(holiday.vendor_id.0).await? {
            return Err(FulfillmentError::NotFound("vendor"));
        }
        let vendor = holiday.vendor_id.0;
        self.calendars
            .add_holiday(VendorHolidayRow {
                vendor_id: vendor,
                date: holiday.date,
                reason: holiday.reason,
            })
            .await?;
        self.invalidate_vendor(vendor);
        Ok(())
    }

    /// Remove a vendor non-delivery date
    pub async fn remove_holiday(
        &self,
        vendor_id: VendorId,
        date: NaiveDate,
    ) -> Result<(), FulfillmentError> {
        let removed = self.calendars.remove_holiday(vendor_id.0, date).await?;
        if !removed {
            return Err(FulfillmentError::NotFound("holiday"));
        }
        self.invalidate_vendor(vendor_id.0);
        Ok(())
    }

    /// Whether a milkman ID is known to the directory
    pub async fn milkman_known(&self, id: Uuid) -> Result<bool, FulfillmentError> {
        Ok(self.directory.milkman_exists(id).await?)
    }

    /// Whether a customer ID is known to the directory
    pub async fn customer_known(&self, id: Uuid) -> Result<bool, FulfillmentError> {
        Ok(self.directory.customer_exists(id).await?)
    }

    /// Whether a vendor ID is known to the directory
    pub async fn vendor_known(&self, id: Uuid) -> Result<bool, FulfillmentError> {
        Ok(self.directory.vendor_exists(id).await?)
    }

    fn invalidate_vendor(&self, vendor_id: Uuid) {
        if let Err(err) = self
            .holiday_cache
            .invalidate_entries_if(move |key, _| key.0 == vendor_id)
        {
            tracing::warn!(%vendor_id, error = %err, "holiday cache invalidation failed");
        }
    }
}

impl<C, S, P> std::fmt::Debug for ScheduleStore<C, S, P>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleStore").finish_non_exhaustive()
    }
}
