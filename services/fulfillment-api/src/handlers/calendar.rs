//! Vendor calendar handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use milkway_types::{VendorHoliday, VendorId};

use crate::error::{ApiError, ApiResult};
use crate::extractors::ActorHeader;
use crate::handlers::shared::validate_range;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HolidayRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct AddHolidayRequest {
    pub date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HolidaysResponse {
    pub vendor_id: String,
    pub dates: Vec<NaiveDate>,
}

/// GET /api/v1/vendors/{id}/holidays
pub async fn list_holidays(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(range): Query<HolidayRangeQuery>,
) -> ApiResult<Json<HolidaysResponse>> {
    let vendor_id = parse_vendor_id(&id)?;
    validate_range(range.from, range.to)?;

    let dates = state
        .facade
        .vendor_holidays(vendor_id, range.from, range.to)
        .await?;
    Ok(Json(HolidaysResponse {
        vendor_id: vendor_id.to_string(),
        dates,
    }))
}

/// PUT /api/v1/vendors/{id}/holidays
pub async fn add_holiday(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path(id): Path<String>,
    Json(req): Json<AddHolidayRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let vendor_id = parse_vendor_id(&id)?;

    state
        .facade
        .add_holiday(
            VendorHoliday {
                vendor_id,
                date: req.date,
                reason: req.reason,
            },
            actor,
        )
        .await?;

    metrics::counter!("fulfillment_holidays_added_total").increment(1);
    tracing::info!(vendor_id = %vendor_id, date = %req.date, actor = %actor, "Holiday added");
    Ok(Json(serde_json::json!({ "added": true })))
}

/// DELETE /api/v1/vendors/{id}/holidays/{date}
pub async fn remove_holiday(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Path((id, date)): Path<(String, NaiveDate)>,
) -> ApiResult<Json<serde_json::Value>> {
    let vendor_id = parse_vendor_id(&id)?;

    state.facade.remove_holiday(vendor_id, date, actor).await?;

    tracing::info!(vendor_id = %vendor_id, date = %date, actor = %actor, "Holiday removed");
    Ok(Json(serde_json::json!({ "removed": true })))
}

fn parse_vendor_id(raw: &str) -> Result<VendorId, ApiError> {
    VendorId::parse(raw).map_err(|_| ApiError::BadRequest("Invalid vendor_id".to_string()))
}
