//! Property-based tests for occurrence derivation
//!
//! These tests verify:
//! - Generation is deterministic and pure (same inputs, same sequence)
//! - Every generated occurrence lies inside the requested range and term
//! - Recurrence membership holds for every generated date
//! - Holiday and pause dates never come back `Pending`
//! - Pausing removes exactly the window's dates and nothing else

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use proptest::prelude::*;

use milkway_core::engine;
use milkway_types::{
    CustomerId, MilkmanId, OccurrenceStatus, PauseWindow, ProductId, Recurrence, Subscription,
    SubscriptionId, SubscriptionStatus, VendorId,
};

// ============================================================================
// Strategies
// ============================================================================

const EPOCH: fn() -> NaiveDate = || NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Dates within a year of the fixed epoch
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0u64..365).prop_map(|offset| EPOCH().checked_add_days(Days::new(offset)).unwrap())
}

/// Arbitrary recurrence rules with weekly coverage
fn arb_recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        Just(Recurrence::Daily),
        arb_date().prop_map(|anchor| Recurrence::AlternateDays { anchor }),
        prop::collection::btree_set(0usize..7, 1..=7).prop_map(|days| Recurrence::Weekly {
            weekdays: days.into_iter().map(|d| ALL_WEEKDAYS[d]).collect(),
        }),
    ]
}

/// A subscription plus a generation range of at most 60 days
fn arb_case() -> impl Strategy<Value = (Subscription, NaiveDate, NaiveDate)> {
    (arb_recurrence(), arb_date(), 0u64..60, 1i64..5_000).prop_map(
        |(recurrence, from, span, quantity_ml)| {
            let to = from.checked_add_days(Days::new(span)).unwrap();
            let sub = Subscription {
                id: SubscriptionId::new(),
                customer_id: CustomerId::new(),
                vendor_id: VendorId::new(),
                milkman_id: Some(MilkmanId::new()),
                product_id: ProductId::new(),
                quantity_ml,
                recurrence,
                start_date: EPOCH(),
                end_date: None,
                status: SubscriptionStatus::Active,
                pauses: Vec::new(),
                version: 1,
            };
            (sub, from, to)
        },
    )
}

/// A holiday set drawn from the generation range
fn arb_holidays() -> impl Strategy<Value = BTreeSet<NaiveDate>> {
    prop::collection::btree_set(arb_date(), 0..10)
}

// ============================================================================
// Determinism and range discipline
// ============================================================================

proptest! {
    /// Property: regeneration yields an identical sequence
    #[test]
    fn prop_generation_is_deterministic(
        (sub, from, to) in arb_case(),
        holidays in arb_holidays(),
    ) {
        let first = engine::occurrences(&sub, from, to, &holidays);
        let second = engine::occurrences(&sub, from, to, &holidays);
        prop_assert_eq!(first, second);
    }

    /// Property: every occurrence lies inside the requested range, inside
    /// the subscription term, and on a recurrence-matching date
    #[test]
    fn prop_occurrences_stay_in_range(
        (sub, from, to) in arb_case(),
        holidays in arb_holidays(),
    ) {
        for occ in engine::occurrences(&sub, from, to, &holidays) {
            prop_assert!(occ.date >= from && occ.date <= to);
            prop_assert!(sub.covers(occ.date));
            prop_assert!(sub.recurrence.matches(occ.date));
            prop_assert_eq!(occ.quantity_ml, sub.quantity_ml);
        }
    }

    /// Property: occurrence dates are strictly increasing
    #[test]
    fn prop_occurrences_are_ordered(
        (sub, from, to) in arb_case(),
        holidays in arb_holidays(),
    ) {
        let occs = engine::occurrences(&sub, from, to, &holidays);
        for pair in occs.windows(2) {
            prop_assert!(pair[0].date < pair[1].date);
        }
    }

    /// Property: holiday dates never come back pending
    #[test]
    fn prop_holidays_never_pending(
        (sub, from, to) in arb_case(),
        holidays in arb_holidays(),
    ) {
        for occ in engine::occurrences(&sub, from, to, &holidays) {
            if holidays.contains(&occ.date) {
                prop_assert_eq!(occ.status, OccurrenceStatus::Skipped);
            }
        }
    }

    /// Property: alternate-day rules only yield dates an even number of
    /// days from the anchor
    #[test]
    fn prop_alternate_days_parity(
        anchor in arb_date(),
        from in arb_date(),
        span in 0u64..60,
    ) {
        let to = from.checked_add_days(Days::new(span)).unwrap();
        let sub = Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            milkman_id: None,
            product_id: ProductId::new(),
            quantity_ml: 1_000,
            recurrence: Recurrence::AlternateDays { anchor },
            start_date: EPOCH(),
            end_date: None,
            status: SubscriptionStatus::Active,
            pauses: Vec::new(),
            version: 1,
        };
        for occ in engine::occurrences(&sub, from, to, &BTreeSet::new()) {
            let days = (occ.date - anchor).num_days();
            prop_assert!(days >= 0);
            prop_assert_eq!(days % 2, 0);
        }
    }

    /// Property: weekly rules only yield member weekdays
    #[test]
    fn prop_weekly_members_only(
        days in prop::collection::btree_set(0usize..7, 1..=7),
        from in arb_date(),
        span in 0u64..60,
    ) {
        let weekdays: Vec<Weekday> = days.into_iter().map(|d| ALL_WEEKDAYS[d]).collect();
        let to = from.checked_add_days(Days::new(span)).unwrap();
        let sub = Subscription {
            id: SubscriptionId::new(),
            customer_id: CustomerId::new(),
            vendor_id: VendorId::new(),
            milkman_id: None,
            product_id: ProductId::new(),
            quantity_ml: 1_000,
            recurrence: Recurrence::Weekly { weekdays: weekdays.clone() },
            start_date: EPOCH(),
            end_date: None,
            status: SubscriptionStatus::Active,
            pauses: Vec::new(),
            version: 1,
        };
        for occ in engine::occurrences(&sub, from, to, &BTreeSet::new()) {
            prop_assert!(weekdays.contains(&occ.date.weekday()));
        }
    }
}

// ============================================================================
// Pause semantics
// ============================================================================

proptest! {
    /// Property: pausing suppresses exactly the window's dates; everything
    /// outside the window is untouched
    #[test]
    fn prop_pause_removes_exactly_the_window(
        (sub, from, to) in arb_case(),
        pause_start in arb_date(),
        pause_len in 0u64..20,
    ) {
        let pause_end = pause_start.checked_add_days(Days::new(pause_len)).unwrap();
        let window = PauseWindow::new(pause_start, pause_end).unwrap();
        let paused = engine::pause(&sub, window).unwrap();

        let before: BTreeSet<NaiveDate> =
            engine::pending_dates(&sub, from, to, &BTreeSet::new()).into_iter().collect();
        let after: BTreeSet<NaiveDate> =
            engine::pending_dates(&paused, from, to, &BTreeSet::new()).into_iter().collect();

        for d in &before {
            if window.contains(*d) {
                prop_assert!(!after.contains(d), "paused date {d} still pending");
            } else {
                prop_assert!(after.contains(d), "date {d} outside the window vanished");
            }
        }
        // Pausing never adds dates
        prop_assert!(after.is_subset(&before));
    }

    /// Property: pause then resume as of the day after the window restores
    /// the original pending sequence from that day on
    #[test]
    fn prop_resume_restores_after_window(
        (sub, from, to) in arb_case(),
        pause_start in arb_date(),
        pause_len in 0u64..20,
    ) {
        let pause_end = pause_start.checked_add_days(Days::new(pause_len)).unwrap();
        let window = PauseWindow::new(pause_start, pause_end).unwrap();
        let paused = engine::pause(&sub, window).unwrap();
        let resume_day = pause_end.checked_add_days(Days::new(1)).unwrap();
        let resumed = engine::resume(&paused, resume_day).unwrap();

        let original = engine::pending_dates(&sub, from, to, &BTreeSet::new());
        let restored = engine::pending_dates(&resumed, from, to, &BTreeSet::new());

        let original_tail: Vec<NaiveDate> =
            original.into_iter().filter(|d| *d >= resume_day).collect();
        let restored_tail: Vec<NaiveDate> =
            restored.into_iter().filter(|d| *d >= resume_day).collect();
        prop_assert_eq!(original_tail, restored_tail);
    }
}
