//! Vendor delivery calendars

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::VendorId;

/// A vendor-declared non-delivery date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorHoliday {
    /// Vendor the holiday belongs to
    pub vendor_id: VendorId,
    /// Date no deliveries happen
    pub date: NaiveDate,
    /// Optional reason shown to customers
    pub reason: Option<String>,
}
