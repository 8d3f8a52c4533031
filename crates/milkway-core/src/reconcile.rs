//! Delivery reconciliation
//!
//! Matches milkman-reported delivery events to expected occurrences. At most
//! one event resolves an occurrence: the conditional resolution insert is
//! the single-writer gate, so a concurrent duplicate loses cleanly with a
//! conflict instead of overwriting. Everything here is safe to re-invoke;
//! no path retries internally.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use milkway_db::{
    AuditRepository, CalendarRepository, CreateAuditEntry, CreateDeliveryEvent,
    CreateResolution, CreateUnmatchedEvent, DeliveryEventRepository, PartyDirectory,
    ResolutionRepository, SubscriptionRepository, UnmatchedEventRow, UnmatchedRepository,
};
use milkway_types::{
    Actor, DeliveryEventId, MilkmanId, OccurrenceStatus, Subscription, SubscriptionId,
};

use crate::config::FulfillmentConfig;
use crate::engine;
use crate::error::FulfillmentError;
use crate::notify::{FulfillmentNotice, NotificationSink};
use crate::schedule::ScheduleStore;

/// A delivery report arriving from the milkman interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedDelivery {
    /// Subscription the delivery was made against
    pub subscription_id: SubscriptionId,
    /// Reporting milkman
    pub milkman_id: MilkmanId,
    /// Instant of the report
    pub delivered_at: DateTime<Utc>,
    /// Calendar date the delivery was made on
    pub delivered_on: NaiveDate,
    /// Delivered quantity, in milliliters
    pub quantity_ml: i64,
    /// Free-form note from the field
    pub note: Option<String>,
    /// Event this report corrects, if any
    pub supersedes: Option<DeliveryEventId>,
}

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// The recorded delivery event
    pub event_id: DeliveryEventId,
    /// The occurrence date the event resolved
    pub resolved_date: NaiveDate,
    /// Whether the match used the grace window rather than the exact date
    pub grace_match: bool,
}

/// Result of one end-of-day sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Subscriptions examined
    pub subscriptions_checked: u64,
    /// Occurrences newly marked missed by this run
    pub marked_missed: u64,
}

/// Terminal status an administrator may force an occurrence into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedStatus {
    /// The delivery did happen
    Delivered,
    /// The occurrence should not count against anyone
    Skipped,
}

impl ForcedStatus {
    fn as_occurrence_status(self) -> OccurrenceStatus {
        match self {
            Self::Delivered => OccurrenceStatus::Delivered,
            Self::Skipped => OccurrenceStatus::Skipped,
        }
    }
}

/// How a delivery event maps onto the occurrence sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchDecision {
    /// A pending occurrence exists on the event's own date
    Exact(NaiveDate),
    /// A pending occurrence within the grace window; `ambiguous` when more
    /// than one was open
    Grace { date: NaiveDate, ambiguous: bool },
    /// The event's own date is an occurrence that is already resolved
    Duplicate(NaiveDate),
    /// Nothing in the grace window can take this event
    NoMatch,
}

/// Delivery reconciliation service
pub struct Reconciler<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    schedule: ScheduleStore<C, S, P>,
    events: Arc<E>,
    resolutions: Arc<R>,
    unmatched: Arc<U>,
    audit: Arc<A>,
    sink: Arc<dyn NotificationSink>,
    config: FulfillmentConfig,
}

impl<C, S, P, E, R, U, A> Reconciler<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    /// Create a reconciler
    pub fn new(
        schedule: ScheduleStore<C, S, P>,
        events: Arc<E>,
        resolutions: Arc<R>,
        unmatched: Arc<U>,
        audit: Arc<A>,
        sink: Arc<dyn NotificationSink>,
        config: FulfillmentConfig,
    ) -> Self {
        Self {
            schedule,
            events,
            resolutions,
            unmatched,
            audit,
            sink,
            config,
        }
    }

    /// Accept a delivery report and match it to exactly one pending
    /// occurrence.
    ///
    /// The event is persisted before matching: even an unmatched or
    /// conflicting report is never lost. Errors after the append therefore
    /// describe the matching outcome, not a failure to record.
    pub async fn record_delivery(
        &self,
        report: ReportedDelivery,
        actor: Actor,
    ) -> Result<ReconcileOutcome, FulfillmentError> {
        let sub = self.schedule.subscription(report.subscription_id).await?;
        if !self.schedule.milkman_known(report.milkman_id.0).await? {
            return Err(FulfillmentError::NotFound("milkman"));
        }
        if let Some(superseded) = report.supersedes {
            if self.op(self.events.find_by_id(superseded.0), "event lookup").await?.is_none() {
                return Err(FulfillmentError::NotFound("superseded event"));
            }
        }

        let event_id = DeliveryEventId::new();
        let event = self
            .op(
                self.events.create(CreateDeliveryEvent {
                    id: event_id.0,
                    subscription_id: report.subscription_id.0,
                    milkman_id: report.milkman_id.0,
                    delivered_at: report.delivered_at,
                    delivered_on: report.delivered_on,
                    quantity_ml: report.quantity_ml,
                    note: report.note.clone(),
                    supersedes: report.supersedes.map(|s| s.0),
                }),
                "event append",
            )
            .await?;

        let (target, grace_match, ambiguous) = match self
            .match_candidates(&sub, report.delivered_on)
            .await?
        {
            MatchDecision::Exact(date) => (date, false, false),
            MatchDecision::Grace { date, ambiguous } => (date, true, ambiguous),
            MatchDecision::Duplicate(date) => {
                self.sink.publish(FulfillmentNotice::ConflictDetected {
                    subscription_id: sub.id,
                    event_id,
                    date: Some(date),
                });
                self.queue_conflict(&sub, event_id, date).await?;
                return Err(FulfillmentError::Conflict(format!(
                    "duplicate event: occurrence {date} already resolved"
                )));
            }
            MatchDecision::NoMatch => {
                return self
                    .queue_unmatched(&sub, event_id, "no pending occurrence within grace window")
                    .await;
            }
        };

        let inserted = self
            .op(
                self.resolutions.insert_if_absent(CreateResolution {
                    subscription_id: sub.id.0,
                    date: target,
                    status: OccurrenceStatus::Delivered.to_string(),
                    event_id: Some(event.id),
                    resolved_by: actor.to_string(),
                }),
                "resolution insert",
            )
            .await?;

        if !inserted {
            // Lost the single-writer race (or duplicated a resolved
            // occurrence); route to the manual queue.
            self.sink.publish(FulfillmentNotice::ConflictDetected {
                subscription_id: sub.id,
                event_id,
                date: Some(target),
            });
            self.queue_conflict(&sub, event_id, target).await?;
            return Err(FulfillmentError::Conflict(format!(
                "occurrence {target} already resolved"
            )));
        }

        let detail = if ambiguous {
            Some(format!(
                "ambiguous match on {}: chose earliest unresolved occurrence {target}",
                report.delivered_on
            ))
        } else if grace_match {
            Some(format!(
                "grace-window match: event of {} resolved occurrence {target}",
                report.delivered_on
            ))
        } else {
            None
        };
        if ambiguous {
            tracing::info!(
                subscription_id = %sub.id,
                event_id = %event_id,
                resolved_date = %target,
                "ambiguous delivery event matched FIFO"
            );
        }
        self.op(
            self.audit.append(CreateAuditEntry {
                subscription_id: sub.id.0,
                date: Some(target),
                event_id: Some(event.id),
                action: "resolve_delivered".to_string(),
                actor: actor.to_string(),
                detail,
            }),
            "audit append",
        )
        .await?;

        Ok(ReconcileOutcome {
            event_id,
            resolved_date: target,
            grace_match,
        })
    }

    /// Mark every elapsed, unresolved occurrence as missed.
    ///
    /// Idempotent: occurrences already resolved (missed included) are left
    /// untouched, and only newly marked ones emit notices.
    pub async fn sweep(
        &self,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<SweepSummary, FulfillmentError> {
        let Some((from, to)) = engine::sweep_range(as_of, self.config.sweep_horizon_days) else {
            return Ok(SweepSummary::default());
        };

        let mut summary = SweepSummary::default();
        // Cancelled subscriptions still sweep: their pre-cancellation dates
        // can go missed like anyone else's.
        let subs = self.schedule.all_subscriptions(from, to).await?;
        for sub in subs {
            summary.subscriptions_checked += 1;
            summary.marked_missed += self.sweep_subscription(&sub, from, to, actor).await?;
        }

        tracing::info!(
            %as_of,
            subscriptions = summary.subscriptions_checked,
            marked_missed = summary.marked_missed,
            "end-of-day sweep complete"
        );
        Ok(summary)
    }

    async fn sweep_subscription(
        &self,
        sub: &Subscription,
        from: NaiveDate,
        to: NaiveDate,
        actor: Actor,
    ) -> Result<u64, FulfillmentError> {
        let holidays = self.schedule.vendor_holidays(sub.vendor_id, from, to).await?;
        let expected = engine::pending_dates(sub, from, to, &holidays);
        if expected.is_empty() {
            return Ok(0);
        }

        let resolved: BTreeSet<NaiveDate> = self
            .op(
                self.resolutions.list_for_subscription(sub.id.0, from, to),
                "resolution list",
            )
            .await?
            .into_iter()
            .map(|r| r.date)
            .collect();

        let mut marked = 0;
        for date in expected {
            if resolved.contains(&date) {
                continue;
            }
            let inserted = self
                .op(
                    self.resolutions.insert_if_absent(CreateResolution {
                        subscription_id: sub.id.0,
                        date,
                        status: OccurrenceStatus::Missed.to_string(),
                        event_id: None,
                        resolved_by: actor.to_string(),
                    }),
                    "resolution insert",
                )
                .await?;
            if !inserted {
                // Resolved between our read and the insert; nothing to do
                continue;
            }
            marked += 1;
            self.sink.publish(FulfillmentNotice::OccurrenceMissed {
                subscription_id: sub.id,
                customer_id: sub.customer_id,
                vendor_id: sub.vendor_id,
                date,
            });
            self.op(
                self.audit.append(CreateAuditEntry {
                    subscription_id: sub.id.0,
                    date: Some(date),
                    event_id: None,
                    action: "resolve_missed".to_string(),
                    actor: actor.to_string(),
                    detail: None,
                }),
                "audit append",
            )
            .await?;
        }
        Ok(marked)
    }

    /// Resolve an occurrence by administrator decision, closing the queue
    /// entry that prompted it.
    pub async fn force_resolve(
        &self,
        queue_id: Uuid,
        date: NaiveDate,
        status: ForcedStatus,
        actor: Actor,
    ) -> Result<(), FulfillmentError> {
        let entry = self
            .op(self.unmatched.find_by_id(queue_id), "queue lookup")
            .await?
            .ok_or(FulfillmentError::NotFound("unmatched entry"))?;
        if !entry.open {
            return Err(FulfillmentError::InvalidState(
                "unmatched entry is already closed".to_string(),
            ));
        }

        let inserted = self
            .op(
                self.resolutions.insert_if_absent(CreateResolution {
                    subscription_id: entry.subscription_id,
                    date,
                    status: status.as_occurrence_status().to_string(),
                    event_id: Some(entry.event_id),
                    resolved_by: actor.to_string(),
                }),
                "resolution insert",
            )
            .await?;
        if !inserted {
            return Err(FulfillmentError::Conflict(format!(
                "occurrence {date} already resolved"
            )));
        }

        self.op(self.unmatched.close(queue_id), "queue close").await?;
        self.op(
            self.audit.append(CreateAuditEntry {
                subscription_id: entry.subscription_id,
                date: Some(date),
                event_id: Some(entry.event_id),
                action: format!("force_resolve_{}", status.as_occurrence_status()),
                actor: actor.to_string(),
                detail: Some(format!("manual reconciliation of queue entry {queue_id}")),
            }),
            "audit append",
        )
        .await?;
        Ok(())
    }

    /// Open entries in the manual reconciliation queue, oldest first
    pub async fn unmatched_queue(&self) -> Result<Vec<UnmatchedEventRow>, FulfillmentError> {
        Ok(self.op(self.unmatched.list_open(), "queue list").await?)
    }

    /// Pick the occurrence a delivery on `delivered_on` should resolve.
    ///
    /// Exact-date match takes precedence; an exact date that is already
    /// resolved is a duplicate (never silently re-routed); otherwise the
    /// earliest unresolved occurrence within the grace window wins (FIFO).
    async fn match_candidates(
        &self,
        sub: &Subscription,
        delivered_on: NaiveDate,
    ) -> Result<MatchDecision, FulfillmentError> {
        let from = delivered_on
            .checked_sub_days(Days::new(u64::from(self.config.grace_window_days)))
            .unwrap_or(delivered_on);
        let holidays = self.schedule.vendor_holidays(sub.vendor_id, from, delivered_on).await?;
        let expected = engine::pending_dates(sub, from, delivered_on, &holidays);
        if expected.is_empty() {
            return Ok(MatchDecision::NoMatch);
        }

        let resolved: BTreeSet<NaiveDate> = self
            .op(
                self.resolutions.list_for_subscription(sub.id.0, from, delivered_on),
                "resolution list",
            )
            .await?
            .into_iter()
            .map(|r| r.date)
            .collect();

        if expected.contains(&delivered_on) {
            if resolved.contains(&delivered_on) {
                return Ok(MatchDecision::Duplicate(delivered_on));
            }
            return Ok(MatchDecision::Exact(delivered_on));
        }

        // Earliest-first: pending_dates walks forward, so the list is ordered
        let open: Vec<NaiveDate> = expected
            .into_iter()
            .filter(|d| !resolved.contains(d))
            .collect();
        match open.first() {
            Some(&earliest) => Ok(MatchDecision::Grace {
                date: earliest,
                ambiguous: open.len() > 1,
            }),
            None => Ok(MatchDecision::NoMatch),
        }
    }

    async fn queue_unmatched(
        &self,
        sub: &Subscription,
        event_id: DeliveryEventId,
        reason: &str,
    ) -> Result<ReconcileOutcome, FulfillmentError> {
        self.op(
            self.unmatched.create(CreateUnmatchedEvent {
                id: Uuid::new_v4(),
                event_id: event_id.0,
                subscription_id: sub.id.0,
                reason: reason.to_string(),
            }),
            "queue insert",
        )
        .await?;
        tracing::warn!(
            subscription_id = %sub.id,
            event_id = %event_id,
            reason,
            "delivery event queued for manual reconciliation"
        );
        Err(FulfillmentError::UnmatchedEvent { event_id })
    }

    async fn queue_conflict(
        &self,
        sub: &Subscription,
        event_id: DeliveryEventId,
        date: NaiveDate,
    ) -> Result<(), FulfillmentError> {
        self.op(
            self.unmatched.create(CreateUnmatchedEvent {
                id: Uuid::new_v4(),
                event_id: event_id.0,
                subscription_id: sub.id.0,
                reason: format!("conflict: occurrence {date} already resolved"),
            }),
            "queue insert",
        )
        .await?;
        Ok(())
    }

    /// Bound a storage operation by the configured timeout.
    ///
    /// Elapsing surfaces a retryable `Timeout`; nothing holds a lock while
    /// waiting.
    async fn op<T, F>(&self, fut: F, what: &'static str) -> Result<T, FulfillmentError>
    where
        F: Future<Output = milkway_db::DbResult<T>>,
    {
        match tokio::time::timeout(self.config.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FulfillmentError::Timeout(what)),
        }
    }
}

impl<C, S, P, E, R, U, A> std::fmt::Debug for Reconciler<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
