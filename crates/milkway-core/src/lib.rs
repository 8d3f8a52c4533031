//! MilkWay Core - Subscription fulfillment engine
//!
//! Derives expected delivery occurrences from recurring subscriptions,
//! reconciles milkman-reported delivery events against them, and aggregates
//! fulfillment summaries for customers, vendors, and milkmen.
//!
//! # Example
//!
//! ```rust,ignore
//! use milkway_core::{FulfillmentConfig, FulfillmentService, LogSink};
//! use std::sync::Arc;
//!
//! let service = FulfillmentService::new(
//!     repos.subscriptions,
//!     repos.calendars,
//!     repos.events,
//!     repos.resolutions,
//!     repos.unmatched,
//!     repos.audit,
//!     repos.directory,
//!     Arc::new(LogSink),
//!     FulfillmentConfig::new(),
//! );
//!
//! // Record a delivery reported from the field
//! let outcome = service.record_delivery(report, actor).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod notify;
pub mod reconcile;
pub mod report;
pub mod schedule;
pub mod service;

pub use config::FulfillmentConfig;
pub use error::FulfillmentError;
pub use facade::FulfillmentFacade;
pub use notify::{ChannelSink, FulfillmentNotice, LogSink, NotificationSink};
pub use reconcile::{ForcedStatus, ReconcileOutcome, ReportedDelivery, SweepSummary};
pub use schedule::ScheduleStore;
pub use service::{FulfillmentService, NewSubscription};
