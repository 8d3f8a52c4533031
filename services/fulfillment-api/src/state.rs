//! Application state for the Fulfillment API service.

use std::sync::Arc;

use milkway_core::{FulfillmentFacade, FulfillmentService};
use milkway_db::pg::{
    PgAuditRepository, PgCalendarRepository, PgDeliveryEventRepository, PgPartyDirectory,
    PgResolutionRepository, PgSubscriptionRepository, PgUnmatchedRepository,
};
use milkway_db::DbPool;

use crate::config::Config;

/// The fulfillment service over Postgres repositories
pub type Service = FulfillmentService<
    PgCalendarRepository,
    PgSubscriptionRepository,
    PgPartyDirectory,
    PgDeliveryEventRepository,
    PgResolutionRepository,
    PgUnmatchedRepository,
    PgAuditRepository,
>;

/// The capability facade over Postgres repositories
pub type Facade = FulfillmentFacade<
    PgCalendarRepository,
    PgSubscriptionRepository,
    PgPartyDirectory,
    PgDeliveryEventRepository,
    PgResolutionRepository,
    PgUnmatchedRepository,
    PgAuditRepository,
>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Capability-scoped fulfillment operations
    pub facade: Facade,
    /// Database pool (readiness checks)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(facade: Facade, pool: DbPool, config: Config) -> Self {
        Self {
            facade,
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
