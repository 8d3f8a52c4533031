//! Subscription state machine and occurrence derivation
//!
//! Everything in this module is pure: occurrence generation walks a date
//! range and produces the same sequence for the same subscription state
//! every time, and transitions return a new subscription value without
//! touching storage. Persistence and race handling live in the service and
//! reconciler.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use milkway_types::{
    Occurrence, OccurrenceStatus, PauseWindow, Subscription, SubscriptionStatus,
};

use crate::error::FulfillmentError;

/// Derive the occurrences a subscription implies over `[from, to]`.
///
/// Dates matching the recurrence rule but suppressed by a vendor holiday or
/// pause window come back as `Skipped`; deliverable dates come back as
/// `Pending`. Dates outside the subscription term yield nothing. Resolution
/// overlays (delivered/missed) are the reconciler's business, not ours.
pub fn occurrences(
    sub: &Subscription,
    from: NaiveDate,
    to: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<Occurrence> {
    let mut out = Vec::new();
    if to < from {
        return out;
    }

    let mut date = from;
    loop {
        if sub.covers(date) && sub.recurrence.matches(date) {
            let status = if holidays.contains(&date) || sub.paused_on(date) {
                OccurrenceStatus::Skipped
            } else {
                OccurrenceStatus::Pending
            };
            out.push(Occurrence {
                subscription_id: sub.id,
                date,
                quantity_ml: sub.quantity_ml,
                status,
            });
        }
        if date == to {
            break;
        }
        // to >= date and both are valid dates, so the successor exists
        date = date.succ_opt().expect("date overflow walking range");
    }
    out
}

/// Deliverable occurrence dates over `[from, to]`, skipped dates excluded
pub fn pending_dates(
    sub: &Subscription,
    from: NaiveDate,
    to: NaiveDate,
    holidays: &BTreeSet<NaiveDate>,
) -> Vec<NaiveDate> {
    occurrences(sub, from, to, holidays)
        .into_iter()
        .filter(Occurrence::is_open)
        .map(|o| o.date)
        .collect()
}

/// Suspend deliveries for a bounded window.
///
/// Open-ended pauses are rejected upstream by construction (`PauseWindow`
/// carries both bounds). Pausing a cancelled subscription is illegal.
pub fn pause(sub: &Subscription, window: PauseWindow) -> Result<Subscription, FulfillmentError> {
    if sub.status == SubscriptionStatus::Cancelled {
        return Err(FulfillmentError::InvalidState(
            "cannot pause a cancelled subscription".to_string(),
        ));
    }
    let mut next = sub.clone();
    next.pauses.push(window);
    next.status = SubscriptionStatus::Paused;
    Ok(next)
}

/// Resume deliveries from `as_of`.
///
/// Windows that already ended stay for history; windows still running are
/// truncated to the day before `as_of`; windows entirely in the future are
/// dropped.
pub fn resume(sub: &Subscription, as_of: NaiveDate) -> Result<Subscription, FulfillmentError> {
    if sub.status == SubscriptionStatus::Cancelled {
        return Err(FulfillmentError::InvalidState(
            "cannot resume a cancelled subscription".to_string(),
        ));
    }
    let mut next = sub.clone();
    next.pauses.retain_mut(|w| {
        if w.from >= as_of {
            return false;
        }
        if w.until >= as_of {
            // Safe: w.from < as_of, so the truncated window stays ordered
            w.until = as_of.pred_opt().expect("date underflow truncating pause");
        }
        true
    });
    next.status = SubscriptionStatus::Active;
    Ok(next)
}

/// Cancel the subscription effective `as_of`; irreversible.
///
/// The term is truncated so no occurrence past `as_of` is ever generated.
/// History before it is retained for reporting.
pub fn cancel(sub: &Subscription, as_of: NaiveDate) -> Result<Subscription, FulfillmentError> {
    if sub.status == SubscriptionStatus::Cancelled {
        return Err(FulfillmentError::InvalidState(
            "subscription is already cancelled".to_string(),
        ));
    }
    let mut next = sub.clone();
    next.status = SubscriptionStatus::Cancelled;
    next.end_date = Some(match next.end_date {
        Some(end) if end < as_of => end,
        _ => as_of,
    });
    Ok(next)
}

/// Clamp a reporting range to the dates a sweep may mark missed: strictly
/// before `as_of`, at most `horizon_days` back.
pub fn sweep_range(as_of: NaiveDate, horizon_days: u32) -> Option<(NaiveDate, NaiveDate)> {
    let to = as_of.pred_opt()?;
    let from = as_of.checked_sub_days(Days::new(u64::from(horizon_days)))?;
    (from <= to).then_some((from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use milkway_types::{
        CustomerId, MilkmanId, ProductId, Recurrence, SubscriptionId, VendorId,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn subscription(recurrence: Recurrence) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            milkman_id: Some(MilkmanId::new()),
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

    fn no_holidays() -> BTreeSet<NaiveDate> {
        BTreeSet::new()
    }

    #[test]
    fn test_mwf_four_weeks_yields_twelve() {
        let sub = subscription(Recurrence::Weekly {
            weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        });
        // 2025-06-02 is a Monday; four full weeks end Sunday 2025-06-29
        let occs = occurrences(&sub, date(2025, 6, 2), date(2025, 6, 29), &no_holidays());
        assert_eq!(occs.len(), 12);
        for occ in &occs {
            let wd = occ.date.format("%a").to_string();
            assert!(
                matches!(wd.as_str(), "Mon" | "Wed" | "Fri"),
                "unexpected weekday {wd} on {}",
                occ.date
            );
            assert_eq!(occ.status, OccurrenceStatus::Pending);
            assert_eq!(occ.quantity_ml, 1_000);
        }
    }

    #[test]
    fn test_generation_is_idempotent() {
        let sub = subscription(Recurrence::AlternateDays {
            anchor: date(2025, 6, 1),
        });
        let first = occurrences(&sub, date(2025, 6, 1), date(2025, 6, 30), &no_holidays());
        let second = occurrences(&sub, date(2025, 6, 1), date(2025, 6, 30), &no_holidays());
        assert_eq!(first, second);
        assert_eq!(first.len(), 15);
    }

    #[test]
    fn test_holiday_dates_are_skipped() {
        let sub = subscription(Recurrence::Daily);
        let holidays: BTreeSet<NaiveDate> = [date(2025, 6, 5)].into();
        let occs = occurrences(&sub, date(2025, 6, 4), date(2025, 6, 6), &holidays);
        assert_eq!(occs.len(), 3);
        assert_eq!(occs[0].status, OccurrenceStatus::Pending);
        assert_eq!(occs[1].status, OccurrenceStatus::Skipped);
        assert_eq!(occs[2].status, OccurrenceStatus::Pending);
    }

    #[test]
    fn test_pause_window_removes_exactly_those_dates() {
        let sub = subscription(Recurrence::Daily);
        let window = PauseWindow::new(date(2025, 6, 10), date(2025, 6, 12)).unwrap();
        let paused = pause(&sub, window).unwrap();

        let dates = pending_dates(&paused, date(2025, 6, 8), date(2025, 6, 14), &no_holidays());
        assert_eq!(
            dates,
            vec![
                date(2025, 6, 8),
                date(2025, 6, 9),
                date(2025, 6, 13),
                date(2025, 6, 14),
            ]
        );

        // Regeneration over the same state yields the same sequence
        let again = pending_dates(&paused, date(2025, 6, 8), date(2025, 6, 14), &no_holidays());
        assert_eq!(dates, again);
    }

    #[test]
    fn test_occurrences_respect_term_bounds() {
        let mut sub = subscription(Recurrence::Daily);
        sub.end_date = Some(date(2025, 6, 10));
        let occs = occurrences(&sub, date(2025, 5, 25), date(2025, 6, 20), &no_holidays());
        assert_eq!(occs.first().unwrap().date, date(2025, 6, 1));
        assert_eq!(occs.last().unwrap().date, date(2025, 6, 10));
    }

    #[test]
    fn test_empty_range_yields_nothing() {
        let sub = subscription(Recurrence::Daily);
        assert!(occurrences(&sub, date(2025, 6, 10), date(2025, 6, 9), &no_holidays()).is_empty());
    }

    #[test]
    fn test_pause_rejected_after_cancel() {
        let sub = subscription(Recurrence::Daily);
        let cancelled = cancel(&sub, date(2025, 6, 15)).unwrap();
        let window = PauseWindow::new(date(2025, 6, 20), date(2025, 6, 21)).unwrap();
        assert!(matches!(
            pause(&cancelled, window),
            Err(FulfillmentError::InvalidState(_))
        ));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let sub = subscription(Recurrence::Daily);
        let cancelled = cancel(&sub, date(2025, 6, 15)).unwrap();
        assert!(matches!(
            cancel(&cancelled, date(2025, 6, 16)),
            Err(FulfillmentError::InvalidState(_))
        ));
        assert!(matches!(
            resume(&cancelled, date(2025, 6, 16)),
            Err(FulfillmentError::InvalidState(_))
        ));
    }

    #[test]
    fn test_cancel_truncates_future_occurrences() {
        let sub = subscription(Recurrence::Daily);
        let cancelled = cancel(&sub, date(2025, 6, 15)).unwrap();
        let occs = occurrences(&cancelled, date(2025, 6, 1), date(2025, 6, 30), &no_holidays());
        assert_eq!(occs.last().unwrap().date, date(2025, 6, 15));
    }

    #[test]
    fn test_cancel_never_extends_a_shorter_term() {
        let mut sub = subscription(Recurrence::Daily);
        sub.end_date = Some(date(2025, 6, 10));
        let cancelled = cancel(&sub, date(2025, 6, 20)).unwrap();
        assert_eq!(cancelled.end_date, Some(date(2025, 6, 10)));
    }

    #[test]
    fn test_resume_truncates_running_window() {
        let sub = subscription(Recurrence::Daily);
        let window = PauseWindow::new(date(2025, 6, 10), date(2025, 6, 20)).unwrap();
        let paused = pause(&sub, window).unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);

        let resumed = resume(&paused, date(2025, 6, 15)).unwrap();
        assert_eq!(resumed.status, SubscriptionStatus::Active);
        assert_eq!(resumed.pauses.len(), 1);
        assert_eq!(resumed.pauses[0].until, date(2025, 6, 14));

        let dates = pending_dates(&resumed, date(2025, 6, 9), date(2025, 6, 16), &no_holidays());
        assert_eq!(
            dates,
            vec![date(2025, 6, 9), date(2025, 6, 15), date(2025, 6, 16)]
        );
    }

    #[test]
    fn test_resume_drops_future_window() {
        let sub = subscription(Recurrence::Daily);
        let window = PauseWindow::new(date(2025, 7, 1), date(2025, 7, 5)).unwrap();
        let paused = pause(&sub, window).unwrap();
        let resumed = resume(&paused, date(2025, 6, 15)).unwrap();
        assert!(resumed.pauses.is_empty());
    }

    #[test]
    fn test_resume_keeps_elapsed_window_for_history() {
        let sub = subscription(Recurrence::Daily);
        let window = PauseWindow::new(date(2025, 6, 1), date(2025, 6, 5)).unwrap();
        let paused = pause(&sub, window).unwrap();
        let resumed = resume(&paused, date(2025, 6, 15)).unwrap();
        assert_eq!(resumed.pauses.len(), 1);
        assert_eq!(resumed.pauses[0].until, date(2025, 6, 5));
    }

    #[test]
    fn test_sweep_range_bounds() {
        let (from, to) = sweep_range(date(2025, 6, 15), 7).unwrap();
        assert_eq!(to, date(2025, 6, 14));
        assert_eq!(from, date(2025, 6, 8));
    }
}
