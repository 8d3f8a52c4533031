//! Shared handler helpers and input validation

use chrono::NaiveDate;

use crate::error::ApiError;

/// Maximum quantity accepted per delivery or subscription, in milliliters
pub const MAX_QUANTITY_ML: i64 = 100_000;

/// Maximum report/occurrence range, in days
pub const MAX_RANGE_DAYS: i64 = 366;

/// Parse a `YYYY-MM-DD` date query/body field
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid date in {field}: {value}")))
}

/// Validate an inclusive date range and cap its span
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), ApiError> {
    if to < from {
        return Err(ApiError::BadRequest(format!(
            "Range end {to} precedes start {from}"
        )));
    }
    let span = (to - from).num_days() + 1;
    if span > MAX_RANGE_DAYS {
        return Err(ApiError::BadRequest(format!(
            "Range spans {span} days; maximum is {MAX_RANGE_DAYS}"
        )));
    }
    Ok(())
}

/// Validate a milliliter quantity
pub fn validate_quantity(quantity_ml: i64) -> Result<(), ApiError> {
    if quantity_ml <= 0 {
        return Err(ApiError::BadRequest(
            "Quantity must be positive".to_string(),
        ));
    }
    if quantity_ml > MAX_QUANTITY_ML {
        return Err(ApiError::BadRequest(format!(
            "Quantity {quantity_ml} ml exceeds maximum {MAX_QUANTITY_ML}"
        )));
    }
    Ok(())
}
