//! Postgres repository implementations
//!
//! Transient connection errors are retried with exponential backoff here, at
//! the repository boundary. Callers never retry; engine logic is idempotent
//! and safe to re-invoke instead.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::models::*;
use crate::pool::DbPool;
use crate::repo::*;

/// Retry attempts for transient errors
const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff between attempts; doubles each retry
const BACKOFF: Duration = Duration::from_millis(50);

/// Whether an error is worth retrying at the repository boundary
fn is_transient(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
}

/// Run a storage operation, retrying transient failures with backoff
async fn with_retry<T, F, Fut>(op_name: &'static str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = BACKOFF;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    operation = op_name,
                    attempt,
                    error = %err,
                    "transient database error, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(err) => return Err(DbError::Sqlx(err)),
        }
    }
}

/// All Postgres repositories over one shared pool
#[derive(Clone)]
pub struct Repositories {
    /// Subscription store
    pub subscriptions: PgSubscriptionRepository,
    /// Vendor calendar store
    pub calendars: PgCalendarRepository,
    /// Delivery event store
    pub events: PgDeliveryEventRepository,
    /// Occurrence resolution store
    pub resolutions: PgResolutionRepository,
    /// Unmatched event queue
    pub unmatched: PgUnmatchedRepository,
    /// Audit log
    pub audit: PgAuditRepository,
    /// Party existence checks
    pub directory: PgPartyDirectory,
}

impl Repositories {
    /// Create repositories over a shared pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            subscriptions: PgSubscriptionRepository { pool: pool.clone() },
            calendars: PgCalendarRepository { pool: pool.clone() },
            events: PgDeliveryEventRepository { pool: pool.clone() },
            resolutions: PgResolutionRepository { pool: pool.clone() },
            unmatched: PgUnmatchedRepository { pool: pool.clone() },
            audit: PgAuditRepository { pool: pool.clone() },
            directory: PgPartyDirectory { pool },
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

/// Postgres subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: DbPool,
}

const SUBSCRIPTION_COLUMNS: &str = "id, customer_id, vendor_id, milkman_id, product_id, \
     quantity_ml, recurrence, start_date, end_date, status, pauses, version, \
     created_at, updated_at";

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let sql =
            format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1");
        with_retry("subscriptions.find_by_id", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn list_active_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE status <> 'cancelled' \
               AND start_date <= $2 \
               AND (end_date IS NULL OR end_date >= $1) \
             ORDER BY created_at"
        );
        with_retry("subscriptions.list_active_in_range", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE start_date <= $2 \
               AND (end_date IS NULL OR end_date >= $1) \
             ORDER BY created_at"
        );
        with_retry("subscriptions.list_in_range", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> DbResult<Vec<SubscriptionRow>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE customer_id = $1 ORDER BY created_at"
        );
        with_retry("subscriptions.list_by_customer", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(customer_id)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn list_by_vendor(&self, vendor_id: Uuid) -> DbResult<Vec<SubscriptionRow>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions \
             WHERE vendor_id = $1 ORDER BY created_at"
        );
        with_retry("subscriptions.list_by_vendor", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(vendor_id)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let sql = format!(
            "INSERT INTO subscriptions \
             (id, customer_id, vendor_id, milkman_id, product_id, quantity_ml, \
              recurrence, start_date, end_date, status, pauses, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', '[]'::jsonb, 1) \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        );
        with_retry("subscriptions.create", || {
            sqlx::query_as::<_, SubscriptionRow>(&sql)
                .bind(sub.id)
                .bind(sub.customer_id)
                .bind(sub.vendor_id)
                .bind(sub.milkman_id)
                .bind(sub.product_id)
                .bind(sub.quantity_ml)
                .bind(Json(sub.recurrence.clone()))
                .bind(sub.start_date)
                .bind(sub.end_date)
                .fetch_one(&self.pool)
        })
        .await
    }

    async fn update_if_version(
        &self,
        id: Uuid,
        expected_version: i64,
        update: SubscriptionUpdate,
    ) -> DbResult<bool> {
        let result = with_retry("subscriptions.update_if_version", || {
            sqlx::query(
                "UPDATE subscriptions \
                 SET status = $3, pauses = $4, end_date = $5, \
                     version = version + 1, updated_at = now() \
                 WHERE id = $1 AND version = $2",
            )
            .bind(id)
            .bind(expected_version)
            .bind(update.status.to_string())
            .bind(Json(update.pauses.clone()))
            .bind(update.end_date)
            .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Postgres vendor calendar repository
#[derive(Clone)]
pub struct PgCalendarRepository {
    pool: DbPool,
}

#[async_trait]
impl CalendarRepository for PgCalendarRepository {
    async fn holidays_in_range(
        &self,
        vendor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<VendorHolidayRow>> {
        with_retry("calendars.holidays_in_range", || {
            sqlx::query_as::<_, VendorHolidayRow>(
                "SELECT vendor_id, date, reason FROM vendor_holidays \
                 WHERE vendor_id = $1 AND date BETWEEN $2 AND $3 \
                 ORDER BY date",
            )
            .bind(vendor_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
        })
        .await
    }

    async fn add_holiday(&self, holiday: VendorHolidayRow) -> DbResult<()> {
        with_retry("calendars.add_holiday", || {
            sqlx::query(
                "INSERT INTO vendor_holidays (vendor_id, date, reason) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (vendor_id, date) DO UPDATE SET reason = $3",
            )
            .bind(holiday.vendor_id)
            .bind(holiday.date)
            .bind(holiday.reason.clone())
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    async fn remove_holiday(&self, vendor_id: Uuid, date: NaiveDate) -> DbResult<bool> {
        let result = with_retry("calendars.remove_holiday", || {
            sqlx::query("DELETE FROM vendor_holidays WHERE vendor_id = $1 AND date = $2")
                .bind(vendor_id)
                .bind(date)
                .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Postgres delivery event repository
#[derive(Clone)]
pub struct PgDeliveryEventRepository {
    pool: DbPool,
}

const EVENT_COLUMNS: &str = "id, subscription_id, milkman_id, delivered_at, delivered_on, \
     quantity_ml, note, supersedes, created_at";

#[async_trait]
impl DeliveryEventRepository for PgDeliveryEventRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<DeliveryEventRow>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM delivery_events WHERE id = $1");
        with_retry("events.find_by_id", || {
            sqlx::query_as::<_, DeliveryEventRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn create(&self, event: CreateDeliveryEvent) -> DbResult<DeliveryEventRow> {
        let sql = format!(
            "INSERT INTO delivery_events \
             (id, subscription_id, milkman_id, delivered_at, delivered_on, \
              quantity_ml, note, supersedes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {EVENT_COLUMNS}"
        );
        with_retry("events.create", || {
            sqlx::query_as::<_, DeliveryEventRow>(&sql)
                .bind(event.id)
                .bind(event.subscription_id)
                .bind(event.milkman_id)
                .bind(event.delivered_at)
                .bind(event.delivered_on)
                .bind(event.quantity_ml)
                .bind(event.note.clone())
                .bind(event.supersedes)
                .fetch_one(&self.pool)
        })
        .await
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DeliveryEventRow>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM delivery_events \
             WHERE subscription_id = $1 AND delivered_on BETWEEN $2 AND $3 \
             ORDER BY delivered_at"
        );
        with_retry("events.list_for_subscription", || {
            sqlx::query_as::<_, DeliveryEventRow>(&sql)
                .bind(subscription_id)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn list_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DeliveryEventRow>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM delivery_events \
             WHERE delivered_on BETWEEN $1 AND $2 \
             ORDER BY delivered_at"
        );
        with_retry("events.list_in_range", || {
            sqlx::query_as::<_, DeliveryEventRow>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }
}

/// Postgres occurrence resolution repository
#[derive(Clone)]
pub struct PgResolutionRepository {
    pool: DbPool,
}

const RESOLUTION_COLUMNS: &str =
    "subscription_id, date, status, event_id, resolved_by, resolved_at";

#[async_trait]
impl ResolutionRepository for PgResolutionRepository {
    async fn find(
        &self,
        subscription_id: Uuid,
        date: NaiveDate,
    ) -> DbResult<Option<ResolutionRow>> {
        let sql = format!(
            "SELECT {RESOLUTION_COLUMNS} FROM occurrence_resolutions \
             WHERE subscription_id = $1 AND date = $2"
        );
        with_retry("resolutions.find", || {
            sqlx::query_as::<_, ResolutionRow>(&sql)
                .bind(subscription_id)
                .bind(date)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn insert_if_absent(&self, resolution: CreateResolution) -> DbResult<bool> {
        // The primary key on (subscription_id, date) makes this the atomic
        // single-writer gate: losers of a concurrent race affect zero rows.
        let result = with_retry("resolutions.insert_if_absent", || {
            sqlx::query(
                "INSERT INTO occurrence_resolutions \
                 (subscription_id, date, status, event_id, resolved_by) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (subscription_id, date) DO NOTHING",
            )
            .bind(resolution.subscription_id)
            .bind(resolution.date)
            .bind(resolution.status.clone())
            .bind(resolution.event_id)
            .bind(resolution.resolved_by.clone())
            .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<ResolutionRow>> {
        let sql = format!(
            "SELECT {RESOLUTION_COLUMNS} FROM occurrence_resolutions \
             WHERE subscription_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date"
        );
        with_retry("resolutions.list_for_subscription", || {
            sqlx::query_as::<_, ResolutionRow>(&sql)
                .bind(subscription_id)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }

    async fn list_in_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<ResolutionRow>> {
        let sql = format!(
            "SELECT {RESOLUTION_COLUMNS} FROM occurrence_resolutions \
             WHERE date BETWEEN $1 AND $2 \
             ORDER BY subscription_id, date"
        );
        with_retry("resolutions.list_in_range", || {
            sqlx::query_as::<_, ResolutionRow>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
        })
        .await
    }
}

/// Postgres unmatched event queue repository
#[derive(Clone)]
pub struct PgUnmatchedRepository {
    pool: DbPool,
}

const UNMATCHED_COLUMNS: &str =
    "id, event_id, subscription_id, reason, open, created_at, closed_at";

#[async_trait]
impl UnmatchedRepository for PgUnmatchedRepository {
    async fn create(&self, unmatched: CreateUnmatchedEvent) -> DbResult<UnmatchedEventRow> {
        let sql = format!(
            "INSERT INTO unmatched_events (id, event_id, subscription_id, reason, open) \
             VALUES ($1, $2, $3, $4, true) \
             RETURNING {UNMATCHED_COLUMNS}"
        );
        with_retry("unmatched.create", || {
            sqlx::query_as::<_, UnmatchedEventRow>(&sql)
                .bind(unmatched.id)
                .bind(unmatched.event_id)
                .bind(unmatched.subscription_id)
                .bind(unmatched.reason.clone())
                .fetch_one(&self.pool)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UnmatchedEventRow>> {
        let sql = format!("SELECT {UNMATCHED_COLUMNS} FROM unmatched_events WHERE id = $1");
        with_retry("unmatched.find_by_id", || {
            sqlx::query_as::<_, UnmatchedEventRow>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
        })
        .await
    }

    async fn list_open(&self) -> DbResult<Vec<UnmatchedEventRow>> {
        let sql = format!(
            "SELECT {UNMATCHED_COLUMNS} FROM unmatched_events \
             WHERE open ORDER BY created_at"
        );
        with_retry("unmatched.list_open", || {
            sqlx::query_as::<_, UnmatchedEventRow>(&sql).fetch_all(&self.pool)
        })
        .await
    }

    async fn close(&self, id: Uuid) -> DbResult<bool> {
        let result = with_retry("unmatched.close", || {
            sqlx::query(
                "UPDATE unmatched_events SET open = false, closed_at = now() \
                 WHERE id = $1 AND open",
            )
            .bind(id)
            .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Postgres audit log repository
#[derive(Clone)]
pub struct PgAuditRepository {
    pool: DbPool,
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn append(&self, entry: CreateAuditEntry) -> DbResult<()> {
        with_retry("audit.append", || {
            sqlx::query(
                "INSERT INTO audit_log \
                 (id, subscription_id, date, event_id, action, actor, detail) \
                 VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6)",
            )
            .bind(entry.subscription_id)
            .bind(entry.date)
            .bind(entry.event_id)
            .bind(entry.action.clone())
            .bind(entry.actor.clone())
            .bind(entry.detail.clone())
            .execute(&self.pool)
        })
        .await?;
        Ok(())
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> DbResult<Vec<AuditRow>> {
        with_retry("audit.list_for_subscription", || {
            sqlx::query_as::<_, AuditRow>(
                "SELECT id, subscription_id, date, event_id, action, actor, detail, created_at \
                 FROM audit_log WHERE subscription_id = $1 \
                 ORDER BY created_at DESC LIMIT $2",
            )
            .bind(subscription_id)
            .bind(limit)
            .fetch_all(&self.pool)
        })
        .await
    }
}

/// Postgres party directory
#[derive(Clone)]
pub struct PgPartyDirectory {
    pool: DbPool,
}

impl PgPartyDirectory {
    async fn exists(&self, table: &'static str, id: Uuid) -> DbResult<bool> {
        let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
        with_retry("directory.exists", || {
            sqlx::query_scalar::<_, bool>(&sql)
                .bind(id)
                .fetch_one(&self.pool)
        })
        .await
    }
}

#[async_trait]
impl PartyDirectory for PgPartyDirectory {
    async fn customer_exists(&self, id: Uuid) -> DbResult<bool> {
        self.exists("customers", id).await
    }

    async fn vendor_exists(&self, id: Uuid) -> DbResult<bool> {
        self.exists("vendors", id).await
    }

    async fn milkman_exists(&self, id: Uuid) -> DbResult<bool> {
        self.exists("milkmen", id).await
    }
}
