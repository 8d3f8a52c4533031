//! REST API handlers

pub mod calendar;
pub mod deliveries;
pub mod health;
pub mod reports;
pub mod shared;
pub mod subscriptions;

pub use calendar::*;
pub use deliveries::*;
pub use health::*;
pub use reports::*;
pub use subscriptions::*;
