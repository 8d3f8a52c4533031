//! Delivery recording and manual reconciliation handlers

use axum::extract::{Path, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use milkway_core::{ForcedStatus, ReportedDelivery};
use milkway_types::MilkmanId;

use crate::error::{ApiError, ApiResult};
use crate::extractors::ActorHeader;
use crate::handlers::shared::validate_quantity;
use crate::handlers::subscriptions::parse_subscription_id;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RecordDeliveryRequest {
    pub subscription_id: String,
    pub milkman_id: String,
    pub delivered_on: NaiveDate,
    pub quantity_ml: i64,
    pub note: Option<String>,
    pub supersedes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordDeliveryResponse {
    pub event_id: String,
    pub resolved_date: NaiveDate,
    pub grace_match: bool,
}

#[derive(Debug, Serialize)]
pub struct UnmatchedEntryResponse {
    pub id: String,
    pub event_id: String,
    pub subscription_id: String,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ForceResolveRequest {
    pub date: NaiveDate,
    pub status: ForcedStatus,
}

#[derive(Debug, Deserialize)]
pub struct SweepRequest {
    pub as_of: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub subscriptions_checked: u64,
    pub marked_missed: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/deliveries
pub async fn record_delivery(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(req): Json<RecordDeliveryRequest>,
) -> ApiResult<Json<RecordDeliveryResponse>> {
    let start = Instant::now();
    validate_quantity(req.quantity_ml)?;

    let subscription_id = parse_subscription_id(&req.subscription_id)?;
    let milkman_id = MilkmanId::parse(&req.milkman_id)
        .map_err(|_| ApiError::BadRequest("Invalid milkman_id".to_string()))?;
    let supersedes = req
        .supersedes
        .as_deref()
        .map(milkway_types::DeliveryEventId::parse)
        .transpose()
        .map_err(|_| ApiError::BadRequest("Invalid supersedes id".to_string()))?;

    let outcome = state
        .facade
        .record_delivery(
            ReportedDelivery {
                subscription_id,
                milkman_id,
                delivered_at: Utc::now(),
                delivered_on: req.delivered_on,
                quantity_ml: req.quantity_ml,
                note: req.note,
                supersedes,
            },
            actor,
        )
        .await?;

    metrics::counter!("fulfillment_deliveries_recorded_total").increment(1);
    if outcome.grace_match {
        metrics::counter!("fulfillment_grace_matches_total").increment(1);
    }
    metrics::histogram!("fulfillment_operation_duration_seconds", "operation" => "record_delivery")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(RecordDeliveryResponse {
        event_id: outcome.event_id.to_string(),
        resolved_date: outcome.resolved_date,
        grace_match: outcome.grace_match,
    }))
}

/// GET /api/v1/reconciliation/unmatched
pub async fn list_unmatched(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
) -> ApiResult<Json<Vec<UnmatchedEntryResponse>>> {
    let entries = state.facade.unmatched_queue(actor).await?;
    Ok(Json(
        entries
            .into_iter()
            .map(|e| UnmatchedEntryResponse {
                id: e.id.to_string(),
                event_id: e.event_id.to_string(),
                subscription_id: e.subscription_id.to_string(),
                reason: e.reason,
                created_at: e.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// POST /api/v1/reconciliation/unmatched/{id}/resolve
pub async fn force_resolve(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Json(req): Json<ForceResolveRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let queue_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest("Invalid queue entry id".to_string()))?;

    state
        .facade
        .force_resolve(queue_id, req.date, req.status, actor)
        .await?;

    metrics::counter!("fulfillment_force_resolutions_total").increment(1);
    tracing::info!(queue_id = %queue_id, actor = %actor, "Occurrence force-resolved");
    Ok(Json(serde_json::json!({ "resolved": true })))
}

/// POST /api/v1/reconciliation/sweep
pub async fn run_sweep(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Json(req): Json<SweepRequest>,
) -> ApiResult<Json<SweepResponse>> {
    let start = Instant::now();

    let summary = state.facade.sweep(req.as_of, actor).await?;

    metrics::counter!("fulfillment_sweeps_total").increment(1);
    metrics::counter!("fulfillment_occurrences_missed_total")
        .increment(summary.marked_missed);
    metrics::histogram!("fulfillment_operation_duration_seconds", "operation" => "sweep")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(
        as_of = %req.as_of,
        marked_missed = summary.marked_missed,
        "Sweep complete"
    );
    Ok(Json(SweepResponse {
        subscriptions_checked: summary.subscriptions_checked,
        marked_missed: summary.marked_missed,
    }))
}
