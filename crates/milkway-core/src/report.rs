//! Reporting aggregator
//!
//! Pure read-side: derives the expected occurrence set for a range, overlays
//! persisted resolutions, and rolls counts up by customer, vendor, or
//! milkman. Never mutates reconciliation state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use milkway_db::{
    CalendarRepository, DeliveryEventRepository, PartyDirectory, ResolutionRepository,
    ResolutionRow, SubscriptionRepository,
};
use milkway_types::{
    FulfillmentReport, Occurrence, OccurrenceStatus, ReportDimension, ReportRow, Subscription,
};

use crate::engine;
use crate::error::FulfillmentError;
use crate::schedule::ScheduleStore;

/// Fulfillment report builder
pub struct Reporter<C, S, P, E, R>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
{
    schedule: ScheduleStore<C, S, P>,
    events: Arc<E>,
    resolutions: Arc<R>,
}

impl<C, S, P, E, R> Reporter<C, S, P, E, R>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
{
    /// Create a reporter
    pub fn new(schedule: ScheduleStore<C, S, P>, events: Arc<E>, resolutions: Arc<R>) -> Self {
        Self {
            schedule,
            events,
            resolutions,
        }
    }

    /// Summarize fulfillment over `[from, to]`, grouped by `dimension`.
    ///
    /// Occurrences with no resolution count `pending` when their date is on
    /// or after `as_of`, and `missed` when it has elapsed (that is what the
    /// next sweep will record). Cancelled subscriptions contribute their
    /// retained history.
    pub async fn summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        dimension: ReportDimension,
        as_of: NaiveDate,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        if to < from {
            return Err(FulfillmentError::InvalidState(format!(
                "report range end {to} precedes start {from}"
            )));
        }

        let subs = self.schedule.all_subscriptions(from, to).await?;

        // One pass over resolutions and events for the whole range; the
        // per-occurrence overlay below is pure lookup.
        let resolutions: HashMap<(Uuid, NaiveDate), ResolutionRow> = self
            .resolutions
            .list_in_range(from, to)
            .await?
            .into_iter()
            .map(|r| ((r.subscription_id, r.date), r))
            .collect();
        let mut event_milkmen: HashMap<Uuid, Uuid> = HashMap::new();
        let mut event_quantities: HashMap<Uuid, i64> = HashMap::new();
        for event in self.events.list_in_range(from, to).await? {
            event_milkmen.insert(event.id, event.milkman_id);
            event_quantities.insert(event.id, event.quantity_ml);
        }

        let mut report = FulfillmentReport {
            from,
            to,
            as_of,
            dimension,
            rows: Default::default(),
        };

        for sub in &subs {
            let holidays = self.schedule.vendor_holidays(sub.vendor_id, from, to).await?;
            for occ in engine::occurrences(sub, from, to, &holidays) {
                let resolution = resolutions.get(&(sub.id.0, occ.date));
                let status = effective_status(&occ, resolution, as_of)?;

                let Some(key) = group_key(dimension, sub, resolution, &event_milkmen) else {
                    // Milkman dimension with nobody to attribute to
                    continue;
                };
                let row = report.rows.entry(key).or_insert_with(ReportRow::default);

                match status {
                    OccurrenceStatus::Delivered => {
                        row.delivered += 1;
                        row.expected_ml += occ.quantity_ml;
                        let delivered_ml = resolution
                            .and_then(|r| r.event_id)
                            .and_then(|id| event_quantities.get(&id).copied())
                            .unwrap_or(occ.quantity_ml);
                        row.delivered_ml += delivered_ml;
                    }
                    OccurrenceStatus::Missed => {
                        row.missed += 1;
                        row.expected_ml += occ.quantity_ml;
                    }
                    OccurrenceStatus::Pending => {
                        row.pending += 1;
                        row.expected_ml += occ.quantity_ml;
                    }
                    OccurrenceStatus::Skipped => {
                        row.skipped += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Resolve the reporting status of one occurrence
fn effective_status(
    occ: &Occurrence,
    resolution: Option<&ResolutionRow>,
    as_of: NaiveDate,
) -> Result<OccurrenceStatus, FulfillmentError> {
    if let Some(res) = resolution {
        return res.status.parse().map_err(|_| {
            FulfillmentError::Internal(format!(
                "stored resolution carries unknown status {:?}",
                res.status
            ))
        });
    }
    if occ.status == OccurrenceStatus::Skipped {
        return Ok(OccurrenceStatus::Skipped);
    }
    if occ.date < as_of {
        Ok(OccurrenceStatus::Missed)
    } else {
        Ok(OccurrenceStatus::Pending)
    }
}

/// Pick the group key for one occurrence, or `None` when it cannot be
/// attributed along the requested dimension
fn group_key(
    dimension: ReportDimension,
    sub: &Subscription,
    resolution: Option<&ResolutionRow>,
    event_milkmen: &HashMap<Uuid, Uuid>,
) -> Option<Uuid> {
    match dimension {
        ReportDimension::Customer => Some(sub.customer_id.0),
        ReportDimension::Vendor => Some(sub.vendor_id.0),
        ReportDimension::Milkman => resolution
            .and_then(|r| r.event_id)
            .and_then(|id| event_milkmen.get(&id).copied())
            .or_else(|| sub.milkman_id.map(|m| m.0)),
    }
}

impl<C, S, P, E, R> std::fmt::Debug for Reporter<C, S, P, E, R>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use milkway_types::{
        CustomerId, MilkmanId, ProductId, Recurrence, SubscriptionId, SubscriptionStatus,
        VendorId,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn subscription() -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            milkman_id: Some(MilkmanId::new()),
            product_id: ProductId::new(),
            quantity_ml: 500,
            recurrence: Recurrence::Daily,
            start_date: date(2025, 6, 1),
            end_date: None,
            status: SubscriptionStatus::Active,
            pauses: Vec::new(),
            version: 1,
        }
    }

    fn occurrence(sub: &Subscription, d: NaiveDate, status: OccurrenceStatus) -> Occurrence {
        Occurrence {
            subscription_id: sub.id,
            date: d,
            quantity_ml: sub.quantity_ml,
            status,
        }
    }

    fn resolution(sub: &Subscription, d: NaiveDate, status: &str) -> ResolutionRow {
        ResolutionRow {
            subscription_id: sub.id.0,
            date: d,
            status: status.to_string(),
            event_id: None,
            resolved_by: "test".to_string(),
            resolved_at: Utc::now(),
        }
    }

    #[test]
    fn test_unresolved_today_is_pending_not_missed() {
        let sub = subscription();
        let today = date(2025, 6, 10);
        let occ = occurrence(&sub, today, OccurrenceStatus::Pending);
        assert_eq!(
            effective_status(&occ, None, today).unwrap(),
            OccurrenceStatus::Pending
        );
    }

    #[test]
    fn test_unresolved_elapsed_reports_missed() {
        let sub = subscription();
        let occ = occurrence(&sub, date(2025, 6, 9), OccurrenceStatus::Pending);
        assert_eq!(
            effective_status(&occ, None, date(2025, 6, 10)).unwrap(),
            OccurrenceStatus::Missed
        );
    }

    #[test]
    fn test_resolution_overrides_derived_status() {
        let sub = subscription();
        let d = date(2025, 6, 9);
        let occ = occurrence(&sub, d, OccurrenceStatus::Pending);
        let res = resolution(&sub, d, "delivered");
        assert_eq!(
            effective_status(&occ, Some(&res), date(2025, 6, 10)).unwrap(),
            OccurrenceStatus::Delivered
        );
    }

    #[test]
    fn test_skipped_stays_skipped_regardless_of_date() {
        let sub = subscription();
        let occ = occurrence(&sub, date(2025, 6, 1), OccurrenceStatus::Skipped);
        assert_eq!(
            effective_status(&occ, None, date(2025, 6, 10)).unwrap(),
            OccurrenceStatus::Skipped
        );
    }

    #[test]
    fn test_milkman_key_prefers_resolving_event() {
        let sub = subscription();
        let event_id = Uuid::new_v4();
        let other_milkman = Uuid::new_v4();
        let mut res = resolution(&sub, date(2025, 6, 9), "delivered");
        res.event_id = Some(event_id);
        let event_milkmen = HashMap::from([(event_id, other_milkman)]);

        let key = group_key(ReportDimension::Milkman, &sub, Some(&res), &event_milkmen);
        assert_eq!(key, Some(other_milkman));
    }

    #[test]
    fn test_milkman_key_falls_back_to_assignment() {
        let sub = subscription();
        let key = group_key(ReportDimension::Milkman, &sub, None, &HashMap::new());
        assert_eq!(key, sub.milkman_id.map(|m| m.0));
    }

    #[test]
    fn test_milkman_key_absent_when_unattributable() {
        let mut sub = subscription();
        sub.milkman_id = None;
        let key = group_key(ReportDimension::Milkman, &sub, None, &HashMap::new());
        assert_eq!(key, None);
    }
}
