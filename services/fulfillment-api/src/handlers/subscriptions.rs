//! Subscription handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use milkway_core::NewSubscription;
use milkway_types::{
    CustomerId, MilkmanId, Occurrence, PauseWindow, ProductId, Recurrence, Subscription,
    SubscriptionId, VendorId,
};

use crate::error::{ApiError, ApiResult};
use crate::extractors::ActorHeader;
use crate::handlers::shared::{validate_quantity, validate_range};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub vendor_id: String,
    pub milkman_id: Option<String>,
    pub product_id: String,
    pub quantity_ml: i64,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub customer_id: String,
    pub vendor_id: String,
    pub milkman_id: Option<String>,
    pub product_id: String,
    pub quantity_ml: i64,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
    pub pauses: Vec<PauseWindow>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            customer_id: sub.customer_id.to_string(),
            vendor_id: sub.vendor_id.to_string(),
            milkman_id: sub.milkman_id.map(|m| m.to_string()),
            product_id: sub.product_id.to_string(),
            quantity_ml: sub.quantity_ml,
            recurrence: sub.recurrence,
            start_date: sub.start_date,
            end_date: sub.end_date,
            status: sub.status.to_string(),
            pauses: sub.pauses,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub from: NaiveDate,
    pub until: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AsOfRequest {
    pub as_of: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct OccurrenceResponse {
    pub date: NaiveDate,
    pub quantity_ml: i64,
    pub status: String,
}

impl From<Occurrence> for OccurrenceResponse {
    fn from(occ: Occurrence) -> Self {
        Self {
            date: occ.date,
            quantity_ml: occ.quantity_ml,
            status: occ.status.to_string(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();
    validate_quantity(req.quantity_ml)?;

    let customer_id = CustomerId::parse(&req.customer_id)
        .map_err(|_| ApiError::BadRequest("Invalid customer_id".to_string()))?;
    let vendor_id = VendorId::parse(&req.vendor_id)
        .map_err(|_| ApiError::BadRequest("Invalid vendor_id".to_string()))?;
    let milkman_id = req
        .milkman_id
        .as_deref()
        .map(MilkmanId::parse)
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid milkman_id".to_string()))?;
    let product_id = ProductId::parse(&req.product_id)
        .map_err(|_| ApiError::BadRequest("Invalid product_id".to_string()))?;

    let sub = state
        .facade
        .create_subscription(
            NewSubscription {
                customer_id,
                vendor_id,
                milkman_id,
                product_id,
                quantity_ml: req.quantity_ml,
                recurrence: req.recurrence,
                start_date: req.start_date,
                end_date: req.end_date,
            },
            actor,
        )
        .await?;

    metrics::counter!("fulfillment_subscriptions_created_total").increment(1);
    metrics::histogram!("fulfillment_operation_duration_seconds", "operation" => "create_subscription")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(subscription_id = %sub.id, actor = %actor, "Subscription created");
    Ok(Json(sub.into()))
}

/// GET /api/v1/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let id = parse_subscription_id(&id)?;
    let sub = state.facade.subscription(id, actor).await?;
    Ok(Json(sub.into()))
}

/// GET /api/v1/subscriptions/{id}/occurrences
pub async fn get_occurrences(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Json<Vec<OccurrenceResponse>>> {
    let id = parse_subscription_id(&id)?;
    validate_range(range.from, range.to)?;
    let occs = state
        .facade
        .occurrences(id, range.from, range.to, actor)
        .await?;
    Ok(Json(occs.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/subscriptions/{id}/pause
pub async fn pause_subscription(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Json(req): Json<PauseRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let id = parse_subscription_id(&id)?;
    let window = PauseWindow::new(req.from, req.until)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let sub = state.facade.pause_subscription(id, window, actor).await?;

    metrics::counter!("fulfillment_subscription_pauses_total").increment(1);
    tracing::info!(subscription_id = %sub.id, actor = %actor, "Subscription paused");
    Ok(Json(sub.into()))
}

/// POST /api/v1/subscriptions/{id}/resume
pub async fn resume_subscription(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Json(req): Json<AsOfRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let id = parse_subscription_id(&id)?;
    let sub = state
        .facade
        .resume_subscription(id, req.as_of, actor)
        .await?;
    tracing::info!(subscription_id = %sub.id, actor = %actor, "Subscription resumed");
    Ok(Json(sub.into()))
}

/// POST /api/v1/subscriptions/{id}/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Json(req): Json<AsOfRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let id = parse_subscription_id(&id)?;
    let sub = state
        .facade
        .cancel_subscription(id, req.as_of, actor)
        .await?;

    metrics::counter!("fulfillment_subscription_cancels_total").increment(1);
    tracing::info!(subscription_id = %sub.id, actor = %actor, "Subscription cancelled");
    Ok(Json(sub.into()))
}

/// GET /api/v1/customers/{id}/subscriptions
pub async fn list_customer_subscriptions(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SubscriptionResponse>>> {
    let customer_id = CustomerId::parse(&id)
        .map_err(|_| ApiError::BadRequest("Invalid customer_id".to_string()))?;
    let subs = state
        .facade
        .subscriptions_for_customer(customer_id, actor)
        .await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/vendors/{id}/subscriptions
pub async fn list_vendor_subscriptions(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<SubscriptionResponse>>> {
    let vendor_id = VendorId::parse(&id)
        .map_err(|_| ApiError::BadRequest("Invalid vendor_id".to_string()))?;
    let subs = state
        .facade
        .subscriptions_for_vendor(vendor_id, actor)
        .await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

pub(crate) fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, ApiError> {
    SubscriptionId::parse(raw)
        .map_err(|_| ApiError::BadRequest("Invalid subscription id".to_string()))
}
