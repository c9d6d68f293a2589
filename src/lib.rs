//! Data-access layer for the ventilation monitoring dashboard.
//!
//! [`DashboardClient`] fetches status, history and enhanced metrics, caching
//! each with a TTL, sharing concurrent requests for the same resource, and
//! notifying subscribers whenever fresh data arrives.

pub mod api;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod event;

pub use api::{AuthHeaders, DataKind, Endpoint, FetchError, Transport};
pub use config::Config;
pub use dashboard::{Callback, DashboardClient, DashboardUpdate, SubscriptionId};
