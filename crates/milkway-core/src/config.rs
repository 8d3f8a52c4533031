//! Configuration for the fulfillment engine

use std::time::Duration;

/// Fulfillment engine configuration
///
/// Passed explicitly into the schedule store and reconciler; the engine keeps
/// no ambient global settings.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// How many days late a delivery event may still match a pending
    /// occurrence
    pub grace_window_days: u32,
    /// How far back the end-of-day sweep looks for unresolved occurrences
    pub sweep_horizon_days: u32,
    /// Vendor holiday cache time-to-live
    pub holiday_cache_ttl: Duration,
    /// Vendor holiday cache capacity (cached ranges, not dates)
    pub holiday_cache_capacity: u64,
    /// Upper bound for a single storage operation during reconciliation
    pub op_timeout: Duration,
}

impl FulfillmentConfig {
    /// Create a configuration with production defaults
    pub fn new() -> Self {
        Self {
            grace_window_days: 1,
            sweep_horizon_days: 30,
            holiday_cache_ttl: Duration::from_secs(60),
            holiday_cache_capacity: 10_000,
            op_timeout: Duration::from_secs(5),
        }
    }

    /// Set the grace window in days
    pub fn with_grace_window_days(mut self, days: u32) -> Self {
        self.grace_window_days = days;
        self
    }

    /// Set the sweep horizon in days
    pub fn with_sweep_horizon_days(mut self, days: u32) -> Self {
        self.sweep_horizon_days = days;
        self
    }

    /// Set the holiday cache time-to-live
    pub fn with_holiday_cache_ttl(mut self, ttl: Duration) -> Self {
        self.holiday_cache_ttl = ttl;
        self
    }

    /// Set the storage operation timeout
    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self::new()
    }
}
