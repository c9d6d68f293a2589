//! The dashboard data-access client and its subscriber fan-out.

mod client;
mod subscribers;
mod types;

pub use client::DashboardClient;
pub use subscribers::{Callback, SubscriptionId, Subscribers};
pub use types::DashboardUpdate;
