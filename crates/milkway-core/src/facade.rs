//! Capability-scoped facade
//!
//! The role dashboards (admin, vendor, customer, milkman) are views over the
//! same core operations. This facade is that single implementation: each
//! call authorizes the actor against the touched entities, then delegates to
//! the service. No per-role logic is duplicated anywhere else.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use milkway_db::{
    AuditRepository, AuditRow, CalendarRepository, DeliveryEventRepository, PartyDirectory,
    ResolutionRepository, SubscriptionRepository, UnmatchedEventRow, UnmatchedRepository,
};
use milkway_types::{
    Actor, CustomerId, FulfillmentReport, Occurrence, PauseWindow, ReportDimension, Role,
    Subscription, SubscriptionId, VendorHoliday, VendorId,
};

use crate::error::FulfillmentError;
use crate::reconcile::{ForcedStatus, ReconcileOutcome, ReportedDelivery, SweepSummary};
use crate::service::{FulfillmentService, NewSubscription};

/// Capability-scoped facade over the fulfillment service
pub struct FulfillmentFacade<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    service: Arc<FulfillmentService<C, S, P, E, R, U, A>>,
}

impl<C, S, P, E, R, U, A> Clone for FulfillmentFacade<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

impl<C, S, P, E, R, U, A> FulfillmentFacade<C, S, P, E, R, U, A>
where
    C: CalendarRepository,
    S: SubscriptionRepository,
    P: PartyDirectory,
    E: DeliveryEventRepository,
    R: ResolutionRepository,
    U: UnmatchedRepository,
    A: AuditRepository,
{
    /// Wrap a fulfillment service
    pub fn new(service: Arc<FulfillmentService<C, S, P, E, R, U, A>>) -> Self {
        Self { service }
    }

    /// Direct access to the underlying service, for trusted wiring
    pub fn service(&self) -> &FulfillmentService<C, S, P, E, R, U, A> {
        &self.service
    }

    /// Create a subscription.
    ///
    /// Customers create their own; vendors create for their own vendorship;
    /// admins create anything.
    pub async fn create_subscription(
        &self,
        new: NewSubscription,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Customer => new.customer_id.0 == actor.id,
            Role::Vendor => new.vendor_id.0 == actor.id,
            Role::Milkman => false,
        };
        if !allowed {
            return Err(deny(actor, "create this subscription"));
        }
        self.service.create_subscription(new, actor).await
    }

    /// Read one subscription; owner, vendor, assigned milkman, or admin
    pub async fn subscription(
        &self,
        id: SubscriptionId,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        self.authorize_on(&sub, actor, "view this subscription")?;
        Ok(sub)
    }

    /// Subscriptions belonging to a customer; the customer themself or admin
    pub async fn subscriptions_for_customer(
        &self,
        customer_id: CustomerId,
        actor: Actor,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Customer && customer_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "list this customer's subscriptions"));
        }
        self.service.subscriptions_for_customer(customer_id).await
    }

    /// Subscriptions fulfilled by a vendor; the vendor themself or admin
    pub async fn subscriptions_for_vendor(
        &self,
        vendor_id: VendorId,
        actor: Actor,
    ) -> Result<Vec<Subscription>, FulfillmentError> {
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Vendor && vendor_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "list this vendor's subscriptions"));
        }
        self.service.subscriptions_for_vendor(vendor_id).await
    }

    /// Pause a subscription; owning customer, its vendor, or admin
    pub async fn pause_subscription(
        &self,
        id: SubscriptionId,
        window: PauseWindow,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        self.authorize_mutation(&sub, actor, "pause this subscription")?;
        self.service.pause_subscription(id, window, actor).await
    }

    /// Resume a subscription; owning customer, its vendor, or admin
    pub async fn resume_subscription(
        &self,
        id: SubscriptionId,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        self.authorize_mutation(&sub, actor, "resume this subscription")?;
        self.service.resume_subscription(id, as_of, actor).await
    }

    /// Cancel a subscription; owning customer, its vendor, or admin
    pub async fn cancel_subscription(
        &self,
        id: SubscriptionId,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<Subscription, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        self.authorize_mutation(&sub, actor, "cancel this subscription")?;
        self.service.cancel_subscription(id, as_of, actor).await
    }

    /// Expected occurrences with resolutions overlaid; any party on the
    /// subscription, or admin
    pub async fn occurrences(
        &self,
        id: SubscriptionId,
        from: NaiveDate,
        to: NaiveDate,
        actor: Actor,
    ) -> Result<Vec<Occurrence>, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        self.authorize_on(&sub, actor, "view these occurrences")?;
        self.service.occurrences(id, from, to).await
    }

    /// Record a delivery; the reporting milkman themself or admin
    pub async fn record_delivery(
        &self,
        report: ReportedDelivery,
        actor: Actor,
    ) -> Result<ReconcileOutcome, FulfillmentError> {
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Milkman && report.milkman_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "record deliveries for this milkman"));
        }
        self.service.record_delivery(report, actor).await
    }

    /// Run the end-of-day sweep; admin only
    pub async fn sweep(
        &self,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<SweepSummary, FulfillmentError> {
        self.require_admin(actor, "run the sweep")?;
        self.service.sweep(as_of, actor).await
    }

    /// Force-resolve an occurrence from the manual queue; admin only
    pub async fn force_resolve(
        &self,
        queue_id: Uuid,
        date: NaiveDate,
        status: ForcedStatus,
        actor: Actor,
    ) -> Result<(), FulfillmentError> {
        self.require_admin(actor, "force-resolve occurrences")?;
        self.service.force_resolve(queue_id, date, status, actor).await
    }

    /// List the manual reconciliation queue; admin only
    pub async fn unmatched_queue(
        &self,
        actor: Actor,
    ) -> Result<Vec<UnmatchedEventRow>, FulfillmentError> {
        self.require_admin(actor, "view the reconciliation queue")?;
        self.service.unmatched_queue().await
    }

    /// Vendor non-delivery dates; anyone may read a vendor's calendar
    pub async fn vendor_holidays(
        &self,
        vendor_id: VendorId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<NaiveDate>, FulfillmentError> {
        self.service.vendor_holidays(vendor_id, from, to).await
    }

    /// Declare a vendor non-delivery date; the vendor themself or admin
    pub async fn add_holiday(
        &self,
        holiday: VendorHoliday,
        actor: Actor,
    ) -> Result<(), FulfillmentError> {
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Vendor && holiday.vendor_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "edit this vendor's calendar"));
        }
        self.service.add_holiday(holiday).await
    }

    /// Remove a vendor non-delivery date; the vendor themself or admin
    pub async fn remove_holiday(
        &self,
        vendor_id: VendorId,
        date: NaiveDate,
        actor: Actor,
    ) -> Result<(), FulfillmentError> {
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Vendor && vendor_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "edit this vendor's calendar"));
        }
        self.service.remove_holiday(vendor_id, date).await
    }

    /// Build a fulfillment summary.
    ///
    /// Admins see every row. Other roles must group by their own dimension
    /// and get only their own row back.
    pub async fn report(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        dimension: ReportDimension,
        as_of: NaiveDate,
        actor: Actor,
    ) -> Result<FulfillmentReport, FulfillmentError> {
        let own_dimension = match actor.role {
            Role::Admin => None,
            Role::Customer => Some(ReportDimension::Customer),
            Role::Vendor => Some(ReportDimension::Vendor),
            Role::Milkman => Some(ReportDimension::Milkman),
        };
        if let Some(own) = own_dimension {
            if dimension != own {
                return Err(deny(actor, "request reports across other parties"));
            }
        }

        let mut report = self.service.report(from, to, dimension, as_of).await?;
        if own_dimension.is_some() {
            report.rows.retain(|key, _| *key == actor.id);
        }
        Ok(report)
    }

    /// Audit history for a subscription; admin or its vendor
    pub async fn audit_log(
        &self,
        id: SubscriptionId,
        limit: i64,
        actor: Actor,
    ) -> Result<Vec<AuditRow>, FulfillmentError> {
        let sub = self.service.subscription(id).await?;
        let allowed = matches!(actor.role, Role::Admin)
            || (actor.role == Role::Vendor && sub.vendor_id.0 == actor.id);
        if !allowed {
            return Err(deny(actor, "view this audit history"));
        }
        self.service.audit_log(id, limit).await
    }

    /// Actor may read the subscription: any named party, or admin
    fn authorize_on(
        &self,
        sub: &Subscription,
        actor: Actor,
        what: &str,
    ) -> Result<(), FulfillmentError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Customer => sub.customer_id.0 == actor.id,
            Role::Vendor => sub.vendor_id.0 == actor.id,
            Role::Milkman => sub.milkman_id.is_some_and(|m| m.0 == actor.id),
        };
        if allowed {
            Ok(())
        } else {
            Err(deny(actor, what))
        }
    }

    /// Actor may mutate the subscription: owning customer, its vendor, or
    /// admin (vendor/admin overrides per the lifecycle rules)
    fn authorize_mutation(
        &self,
        sub: &Subscription,
        actor: Actor,
        what: &str,
    ) -> Result<(), FulfillmentError> {
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Customer => sub.customer_id.0 == actor.id,
            Role::Vendor => sub.vendor_id.0 == actor.id,
            Role::Milkman => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(deny(actor, what))
        }
    }

    fn require_admin(&self, actor: Actor, what: &str) -> Result<(), FulfillmentError> {
        if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(deny(actor, what))
        }
    }
}

fn deny(actor: Actor, what: &str) -> FulfillmentError {
    FulfillmentError::Forbidden(format!("{} may not {what}", actor.role))
}

impl<C, S, P, E, R, U, A> std::fmt::Debug for FulfillmentFacade<C, S, P, E, R, U, A>
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
        f.debug_struct("FulfillmentFacade").finish_non_exhaustive()
    }
}
