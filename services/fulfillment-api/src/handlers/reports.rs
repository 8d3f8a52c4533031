//! Reporting handlers

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use milkway_types::ReportDimension;

use crate::error::{ApiError, ApiResult};
use crate::extractors::ActorHeader;
use crate::handlers::shared::validate_range;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub dimension: String,
    /// Defaults to today (UTC) when omitted
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ReportRowResponse {
    pub delivered: u64,
    pub missed: u64,
    pub skipped: u64,
    pub pending: u64,
    pub expected_ml: i64,
    pub delivered_ml: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub as_of: NaiveDate,
    pub dimension: String,
    pub rows: BTreeMap<String, ReportRowResponse>,
}

/// GET /api/v1/reports/fulfillment
pub async fn fulfillment_report(
    State(state): State<AppState>,
    ActorHeader(actor): ActorHeader,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Json<ReportResponse>> {
    let start = Instant::now();
    validate_range(query.from, query.to)?;

    let dimension: ReportDimension = query
        .dimension
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid dimension: {}", query.dimension)))?;
    let as_of = query
        .as_of
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let report = state
        .facade
        .report(query.from, query.to, dimension, as_of, actor)
        .await?;

    metrics::histogram!("fulfillment_operation_duration_seconds", "operation" => "report")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(ReportResponse {
        from: report.from,
        to: report.to,
        as_of: report.as_of,
        dimension: report.dimension.to_string(),
        rows: report
            .rows
            .into_iter()
            .map(|(key, row)| {
                (
                    key.to_string(),
                    ReportRowResponse {
                        delivered: row.delivered,
                        missed: row.missed,
                        skipped: row.skipped,
                        pending: row.pending,
                        expected_ml: row.expected_ml,
                        delivered_ml: row.delivered_ml,
                    },
                )
            })
            .collect(),
    }))
}
