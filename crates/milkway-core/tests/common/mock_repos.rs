//! Mock repositories for testing

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use milkway_core::{FulfillmentConfig, FulfillmentNotice, FulfillmentService, NotificationSink};
use milkway_db::{
    AuditRepository, AuditRow, CalendarRepository, CreateAuditEntry, CreateDeliveryEvent,
    CreateResolution, CreateSubscription, CreateUnmatchedEvent, DbResult, DeliveryEventRepository,
    DeliveryEventRow, Json, PartyDirectory, ResolutionRepository, ResolutionRow,
    SubscriptionRepository, SubscriptionRow, SubscriptionUpdate, UnmatchedEventRow,
    UnmatchedRepository, VendorHolidayRow,
};

/// In-memory subscription repository for testing
#[derive(Default, Clone)]
pub struct MockSubscriptionRepository {
    subs: Arc<DashMap<Uuid, SubscriptionRow>>,
}

impl MockSubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.subs.get(&id).map(|r| r.value().clone()))
    }

    async fn list_active_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let mut rows: Vec<SubscriptionRow> = self
            .subs
            .iter()
            .filter(|r| {
                r.status != "cancelled"
                    && r.start_date <= to
                    && r.end_date.is_none_or(|end| end >= from)
            })
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<SubscriptionRow>> {
        let mut rows: Vec<SubscriptionRow> = self
            .subs
            .iter()
            .filter(|r| r.start_date <= to && r.end_date.is_none_or(|end| end >= from))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .subs
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn list_by_vendor(&self, vendor_id: Uuid) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .subs
            .iter()
            .filter(|r| r.vendor_id == vendor_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let now = Utc::now();
        let row = SubscriptionRow {
            id: sub.id,
            customer_id: sub.customer_id,
            vendor_id: sub.vendor_id,
            milkman_id: sub.milkman_id,
            product_id: sub.product_id,
            quantity_ml: sub.quantity_ml,
            recurrence: Json(sub.recurrence),
            start_date: sub.start_date,
            end_date: sub.end_date,
            status: "active".to_string(),
            pauses: Json(Vec::new()),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.subs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        update: SubscriptionUpdate,
    ) -> DbResult<bool> {
        match self.subs.get_mut(&id) {
            Some(mut row) if row.version == expected_version => {
                row.status = update.status.to_string();
                row.pauses = Json(update.pauses);
                row.end_date = update.end_date;
                row.version += 1;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory vendor calendar repository for testing
#[derive(Default, Clone)]
pub struct MockCalendarRepository {
    holidays: Arc<DashMap<(Uuid, NaiveDate), VendorHolidayRow>>,
}

impl MockCalendarRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarRepository for MockCalendarRepository {
    async fn holidays_in_range(
        &self,
        vendor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<VendorHolidayRow>> {
        let mut rows: Vec<VendorHolidayRow> = self
            .holidays
            .iter()
            .filter(|r| r.vendor_id == vendor_id && r.date >= from && r.date <= to)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn add_holiday(&self, holiday: VendorHolidayRow) -> DbResult<()> {
        self.holidays
            .insert((holiday.vendor_id, holiday.date), holiday);
        Ok(())
    }

    async fn remove_holiday(&self, vendor_id: Uuid, date: NaiveDate) -> DbResult<bool> {
        Ok(self.holidays.remove(&(vendor_id, date)).is_some())
    }
}

/// In-memory delivery event repository for testing
#[derive(Default, Clone)]
pub struct MockDeliveryEventRepository {
    events: Arc<DashMap<Uuid, DeliveryEventRow>>,
}

impl MockDeliveryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryEventRepository for MockDeliveryEventRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DeliveryEventRow>> {
        Ok(self.events.get(&id).map(|r| r.value().clone()))
    }

    async fn create(&self, event: CreateDeliveryEvent) -> DbResult<DeliveryEventRow> {
        let row = DeliveryEventRow {
            id: event.id,
            subscription_id: event.subscription_id,
            milkman_id: event.milkman_id,
            delivered_at: event.delivered_at,
            delivered_on: event.delivered_on,
            quantity_ml: event.quantity_ml,
            note: event.note,
            supersedes: event.supersedes,
            created_at: Utc::now(),
        };
        self.events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DeliveryEventRow>> {
        let mut rows: Vec<DeliveryEventRow> = self
            .events
            .iter()
            .filter(|r| {
                r.subscription_id == subscription_id
                    && r.delivered_on >= from
                    && r.delivered_on <= to
            })
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.delivered_at);
        Ok(rows)
    }

    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DeliveryEventRow>> {
        let mut rows: Vec<DeliveryEventRow> = self
            .events
            .iter()
            .filter(|r| r.delivered_on >= from && r.delivered_on <= to)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.delivered_at);
        Ok(rows)
    }
}

/// In-memory resolution repository for testing
///
/// The entry-API insert mirrors the Postgres `ON CONFLICT DO NOTHING`
/// single-writer gate.
#[derive(Default, Clone)]
pub struct MockResolutionRepository {
    resolutions: Arc<DashMap<(Uuid, NaiveDate), ResolutionRow>>,
}

impl MockResolutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResolutionRepository for MockResolutionRepository {
    async fn find(
        &self,
        subscription_id: Uuid,
        date: NaiveDate,
    ) -> DbResult<Option<ResolutionRow>> {
        Ok(self
            .resolutions
            .get(&(subscription_id, date))
            .map(|r| r.value().clone()))
    }

    async fn insert_if_absent(&self, resolution: CreateResolution) -> DbResult<bool> {
        let key = (resolution.subscription_id, resolution.date);
        match self.resolutions.entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(ResolutionRow {
                    subscription_id: resolution.subscription_id,
                    date: resolution.date,
                    status: resolution.status,
                    event_id: resolution.event_id,
                    resolved_by: resolution.resolved_by,
                    resolved_at: Utc::now(),
                });
                Ok(true)
            }
        }
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<ResolutionRow>> {
        let mut rows: Vec<ResolutionRow> = self
            .resolutions
            .iter()
            .filter(|r| {
                r.subscription_id == subscription_id && r.date >= from && r.date <= to
            })
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.date);
        Ok(rows)
    }

    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<ResolutionRow>> {
        let mut rows: Vec<ResolutionRow> = self
            .resolutions
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| (r.subscription_id, r.date));
        Ok(rows)
    }
}

/// In-memory unmatched event queue for testing
#[derive(Default, Clone)]
pub struct MockUnmatchedRepository {
    entries: Arc<DashMap<Uuid, UnmatchedEventRow>>,
}

impl MockUnmatchedRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnmatchedRepository for MockUnmatchedRepository {
    async fn create(&self, unmatched: CreateUnmatchedEvent) -> DbResult<UnmatchedEventRow> {
        let row = UnmatchedEventRow {
            id: unmatched.id,
            event_id: unmatched.event_id,
            subscription_id: unmatched.subscription_id,
            reason: unmatched.reason,
            open: true,
            created_at: Utc::now(),
            closed_at: None,
        };
        self.entries.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UnmatchedEventRow>> {
        Ok(self.entries.get(&id).map(|r| r.value().clone()))
    }

    async fn list_open(&self) -> DbResult<Vec<UnmatchedEventRow>> {
        let mut rows: Vec<UnmatchedEventRow> = self
            .entries
            .iter()
            .filter(|r| r.open)
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn close(&self, id: Uuid) -> DbResult<bool> {
        match self.entries.get_mut(&id) {
            Some(mut row) if row.open => {
                row.open = false;
                row.closed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-memory audit log for testing
#[derive(Default, Clone)]
pub struct MockAuditRepository {
    entries: Arc<Mutex<Vec<AuditRow>>>,
}

impl MockAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded actions, oldest first
    #[allow(dead_code)]
    pub fn actions(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }
}

#[async_trait]
impl AuditRepository for MockAuditRepository {
    async fn append(&self, entry: CreateAuditEntry) -> DbResult<()> {
        self.entries.lock().unwrap().push(AuditRow {
            id: Uuid::new_v4(),
            subscription_id: entry.subscription_id,
            date: entry.date,
            event_id: entry.event_id,
            action: entry.action,
            actor: entry.actor,
            detail: entry.detail,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> DbResult<Vec<AuditRow>> {
        let mut rows: Vec<AuditRow> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

/// In-memory party directory for testing
#[derive(Default, Clone)]
pub struct MockPartyDirectory {
    customers: Arc<DashSet<Uuid>>,
    vendors: Arc<DashSet<Uuid>>,
    milkmen: Arc<DashSet<Uuid>>,
}

impl MockPartyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_customer(&self, id: Uuid) {
        self.customers.insert(id);
    }

    pub fn register_vendor(&self, id: Uuid) {
        self.vendors.insert(id);
    }

    pub fn register_milkman(&self, id: Uuid) {
        self.milkmen.insert(id);
    }
}

#[async_trait]
impl PartyDirectory for MockPartyDirectory {
    async fn customer_exists(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.customers.contains(&id))
    }

    async fn vendor_exists(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.vendors.contains(&id))
    }

    async fn milkman_exists(&self, id: Uuid) -> DbResult<bool> {
        Ok(self.milkmen.contains(&id))
    }
}

/// Notification sink capturing notices for assertions
#[derive(Default, Clone)]
pub struct RecordingSink {
    notices: Arc<Mutex<Vec<FulfillmentNotice>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<FulfillmentNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notice: FulfillmentNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// The fulfillment service type wired against all mock repositories
pub type MockService = FulfillmentService<
    MockCalendarRepository,
    MockSubscriptionRepository,
    MockPartyDirectory,
    MockDeliveryEventRepository,
    MockResolutionRepository,
    MockUnmatchedRepository,
    MockAuditRepository,
>;

/// The facade type wired against all mock repositories
pub type MockFacade = milkway_core::FulfillmentFacade<
    MockCalendarRepository,
    MockSubscriptionRepository,
    MockPartyDirectory,
    MockDeliveryEventRepository,
    MockResolutionRepository,
    MockUnmatchedRepository,
    MockAuditRepository,
>;

/// A fully wired in-memory fulfillment world
pub struct TestWorld {
    pub service: Arc<MockService>,
    pub subscriptions: MockSubscriptionRepository,
    pub directory: MockPartyDirectory,
    pub audit: MockAuditRepository,
    pub unmatched: MockUnmatchedRepository,
    pub sink: RecordingSink,
}

impl TestWorld {
    /// Build a world with the given engine configuration
    pub fn with_config(config: FulfillmentConfig) -> Self {
        let subscriptions = MockSubscriptionRepository::new();
        let calendars = MockCalendarRepository::new();
        let events = MockDeliveryEventRepository::new();
        let resolutions = MockResolutionRepository::new();
        let unmatched = MockUnmatchedRepository::new();
        let audit = MockAuditRepository::new();
        let directory = MockPartyDirectory::new();
        let sink = RecordingSink::new();

        let service = FulfillmentService::new(
            Arc::new(subscriptions.clone()),
            Arc::new(calendars),
            Arc::new(events),
            Arc::new(resolutions),
            Arc::new(unmatched.clone()),
            Arc::new(audit.clone()),
            Arc::new(directory.clone()),
            Arc::new(sink.clone()),
            config,
        );

        Self {
            service: Arc::new(service),
            subscriptions,
            directory,
            audit,
            unmatched,
            sink,
        }
    }

    /// Build a world with default configuration
    pub fn new() -> Self {
        Self::with_config(FulfillmentConfig::new())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
