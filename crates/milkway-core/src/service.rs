//! Fulfillment service - ties together the schedule store, occurrence
//! engine, reconciler, and reporter over one repository set.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use milkway_db::{
    AuditRepository, AuditRow, CalendarRepository, CreateAuditEntry, CreateSubscription,
    DeliveryEventRepository, PartyDirectory, ResolutionRepository, SubscriptionRepository,
    SubscriptionUpdate, UnmatchedEventRow, UnmatchedRepository,
};
use milkway_types::{
    Actor, CustomerId, FulfillmentReport, MilkmanId, Occurrence, PauseWindow, ProductId,
    Recurrence, ReportDimension, Subscription, SubscriptionId, SubscriptionStatus,
    VendorHoliday, VendorId,
};

use crate::config::FulfillmentConfig;
use crate::engine;
use crate::error::FulfillmentError;
use crate::notify::NotificationSink;
use crate::reconcile::{
    ForcedStatus, ReconcileOutcome, Reconciler, ReportedDelivery, SweepSummary,
};
use crate::report::Reporter;
use crate::schedule::ScheduleStore;

/// Input for creating a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
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
}

/// Fulfillment service
///
/// The single entry point the administrative surface talks to. Role
/// dashboards go through [`crate::FulfillmentFacade`], which scopes these
/// operations per actor.
pub struct FulfillmentService<C, S, P, E, R, U, A>
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
    reconciler: Reconciler<C, S, P, E, R, U, A>,
    reporter: Reporter<C, S, P, E, R>,
    subscriptions: Arc<S>,
    resolutions: Arc<R>,
    audit: Arc<A>,
}

impl<C, S, P, E, R, U, A> FulfillmentService<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    /// Create a fulfillment service
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscriptions: Arc<S>,
        calendars: Arc<C>,
        events: Arc<E>,
        resolutions: Arc<R>,
        unmatched: Arc<U>,
        audit: Arc<A>,
        directory: Arc<P>,
        sink: Arc<dyn NotificationSink>,
        config: FulfillmentConfig,
    ) -> Self {
        let schedule = ScheduleStore::new(
            calendars,
            Arc::clone(&subscriptions),
            directory,
            &config,
        );
        let reconciler = Reconciler::new(
            schedule.clone(),
            Arc::clone(&events),
            Arc::clone(&resolutions),
            unmatched,
            Arc::clone(&audit),
            sink,
            config,
        );
        let reporter = Reporter::new(schedule.clone(), events, Arc::clone(&resolutions));
        Self {
            schedule,
            reconciler,
            reporter,
            subscriptions,
            resolutions,
            audit,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Create a subscription after validating its references and invariants
    pub async fn create_subscription(
        &self,
        new: NewSubscription,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        if !self.schedule.customer_known(new.customer_id.0).await? {
            return Err(FulfillmentError::NotFound("customer"));
        }
        if !self.schedule.vendor_known(new.vendor_id.0).await? {
            return Err(FulfillmentError::NotFound("vendor"));
        }
        if let Some(milkman_id) = new.milkman_id {
            if !self.schedule.milkman_known(milkman_id.0).await? {
                return Err(FulfillmentError::NotFound("milkman"));
            }
        }

        let candidate = Subscription {
            id: SubscriptionId::new(),
            customer_id: new.customer_id,
            vendor_id: new.vendor_id,
            milkman_id: new.milkman_id,
            product_id: new.product_id,
            quantity_ml: new.quantity_ml,
            recurrence: new.recurrence.clone(),
            start_date: new.start_date,
            end_date: new.end_date,
            status: SubscriptionStatus::Active,
            pauses: Vec::new(),
            version: 1,
        };
        candidate.validate()?;

        let row = self
            .subscriptions
            .create(CreateSubscription {
                id: candidate.id.0,
                customer_id: candidate.customer_id.0,
                vendor_id: candidate.vendor_id.0,
                milkman_id: candidate.milkman_id.map(|m| m.0),
                product_id: candidate.product_id.0,
                quantity_ml: candidate.quantity_ml,
                recurrence: candidate.recurrence.clone(),
                start_date: candidate.start_date,
                end_date: candidate.end_date,
            })
            .await?;
        let created = row.to_domain()?;

        self.audit
            .append(CreateAuditEntry {
                subscription_id: created.id.0,
                date: None,
                event_id: None,
                action: "create_subscription".to_string(),
                actor: actor.to_string(),
                detail: None,
            })
            .await?;

        tracing::info!(subscription_id = %created.id, customer_id = %created.customer_id, "subscription created");
        Ok(created)
    }

    /// Load one subscription
    pub async fn subscription(&self, id: SubscriptionId) -> Result<Subscription, FulfillmentError> {
        self.schedule.subscription(id).await
    }

    /// All subscriptions for a customer, cancelled included
    pub async fn subscriptions_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        if !self.schedule.customer_known(customer_id.0).await? {
            return Err(FulfillmentError::NotFound("customer"));
        }
        let rows = self.subscriptions.list_by_customer(customer_id.0).await?;
        rows.iter().map(|r| r.to_domain().map_err(Into::into)).collect()
    }

    /// All subscriptions for a vendor, cancelled included
    pub async fn subscriptions_for_vendor(
        &self,
        vendor_id: VendorId,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        if !self.schedule.vendor_known(vendor_id.0).await? {
            return Err(FulfillmentError::NotFound("vendor"));
        }
        let rows = self.subscriptions.list_by_vendor(vendor_id.0).await?;
        rows.iter().map(|r| r.to_domain().map_err(Into::into)).collect()
    }

    /// Suspend deliveries for a bounded window
    pub async fn pause_subscription(
        &self,
        id: SubscriptionId,
        window: PauseWindow,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.schedule.subscription(id).await?;
        let next = engine::pause(&sub, window)?;
        self.persist_transition(
            &sub,
            next,
            "pause_subscription",
            Some(format!("paused {} through {}", window.from, window.until)),
            actor,
        )
        .await
    }

    /// Resume deliveries from `as_of`
    pub async fn resume_subscription(
        &self,
        id: SubscriptionId,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.schedule.subscription(id).await?;
        let next = engine::resume(&sub, as_of)?;
        self.persist_transition(
            &sub,
            next,
            "resume_subscription",
            Some(format!("resumed as of {as_of}")),
            actor,
        )
        .await
    }

    /// Cancel the subscription effective `as_of`; irreversible
    pub async fn cancel_subscription(
        &self,
        id: SubscriptionId,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.schedule.subscription(id).await?;
        let next = engine::cancel(&sub, as_of)?;
        self.persist_transition(
            &sub,
            next,
            "cancel_subscription",
            Some(format!("cancelled effective {as_of}")),
            actor,
        )
        .await
    }

    /// Expected occurrences for one subscription with persisted resolutions
    /// overlaid
    pub async fn occurrences(
        &self,
        id: SubscriptionId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Occurrence>, FulfillmentError> {
        let sub = self.schedule.subscription(id).await?;
        let holidays = self.schedule.vendor_holidays(sub.vendor_id, from, to).await?;
        let mut occs = engine::occurrences(&sub, from, to, &holidays);

        let resolutions = self.resolutions.list_for_subscription(id.0, from, to).await?;
        for res in resolutions {
            if let Some(occ) = occs.iter_mut().find(|o| o.date == res.date) {
                occ.status = res.status.parse().map_err(|_| {
                    FulfillmentError::Internal(format!(
                        "stored resolution carries unknown status {:?}",
                        res.status
                    ))
                })?;
            }
        }
        Ok(occs)
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Accept a milkman delivery report
    pub async fn record_delivery(
        &self,
        report: ReportedDelivery,
        actor: Actor,
    ) -> Result<ReconcileOutcome, FulfillmentError> {
        self.reconciler.record_delivery(report, actor).await
    }

    /// Run the end-of-day sweep
    pub async fn sweep(
        &self,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<SweepSummary, FulfillmentError> {
        self.reconciler.sweep(as_of, actor).await
    }

    /// Resolve an occurrence by administrator decision
    pub async fn force_resolve(
        &self,
        queue_id: Uuid,
        date: NaiveDate,
        status: ForcedStatus,
        actor: Actor,
    ) -> Result<(), FulfillmentError> {
        self.reconciler.force_resolve(queue_id, date, status, actor).await
    }

    /// Open entries in the manual reconciliation queue
    pub async fn unmatched_queue(&self) -> Result<Vec<UnmatchedEventRow>, FulfillmentError> {
        self.reconciler.unmatched_queue().await
    }

    // =========================================================================
    // Calendars and reporting
    // =========================================================================

    /// Vendor non-delivery dates inside the range
    pub async fn vendor_holidays(
        &self,
        vendor_id: VendorId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, FulfillmentError> {
        let holidays = self.schedule.vendor_holidays(vendor_id, from, to).await?;
        Ok(holidays.iter().copied().collect())
    }

    /// Declare a vendor non-delivery date
    pub async fn add_holiday(&self, holiday: VendorHoliday) -> Result<(), FulfillmentError> {
        self.schedule.add_holiday(holiday).await
    }

    /// Remove a vendor non-delivery date
    pub async fn remove_holiday(
        &self,
        vendor_id: VendorId,
        date: NaiveDate,
    ) -> Result<(), FulfillmentError> {
        self.schedule.remove_holiday(vendor_id, date).await
    }

    /// Build a fulfillment summary
    pub async fn report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        dimension: ReportDimension,
        as_of: NaiveDate,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        self.reporter.summary(from, to, dimension, as_of).await
    }

    /// Latest audit entries for a subscription, newest first
    pub async fn audit_log(
        &self,
        id: SubscriptionId,
        limit: i64,
    ) -> Result<Vec<AuditRow>, FulfillmentError> {
        Ok(self.audit.list_for_subscription(id.0, limit).await?)
    }

    /// Persist a state transition with the optimistic version check
    async fn persist_transition(
        &self,
        before: &Subscription,
        next: Subscription,
        action: &str,
        detail: Option<String>,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let applied = self
            .subscriptions
            .update_if_version(
                before.id.0,
                before.version,
                SubscriptionUpdate {
                    status: next.status,
                    pauses: next.pauses.clone(),
                    end_date: next.end_date,
                },
            )
            .await?;
        if !applied {
            return Err(FulfillmentError::Conflict(
                "subscription was modified concurrently".to_string(),
            ));
        }

        self.audit
            .append(CreateAuditEntry {
                subscription_id: before.id.0,
                date: None,
                event_id: None,
                action: action.to_string(),
                actor: actor.to_string(),
                detail,
            })
            .await?;

        tracing::info!(subscription_id = %before.id, action, "subscription transition applied");
        Ok(Subscription {
            version: before.version + 1,
            ..next
        })
    }
}

impl<C, S, P, E, R, U, A> std::fmt::Debug for FulfillmentService<C, S, P, E, R, U, A>
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
        f.debug_struct("FulfillmentService").finish_non_exhaustive()
    }
}
