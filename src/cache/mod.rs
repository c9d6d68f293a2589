//! In-memory caching for dashboard payloads.
//!
//! - [`CacheStore`] keeps one TTL entry per singular kind and one per history window
//! - [`InFlight`] shares a single pending fetch between concurrent callers of the same key

mod inflight;
mod store;

pub use inflight::{InFlight, SharedFetch};
pub use store::{history_key, CacheEntry, CacheSnapshot, CacheStore};
