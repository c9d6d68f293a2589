//! TTL cache entries and the store that owns them.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::api::Endpoint;
use crate::config::CacheConfig;

/// A cached payload together with when it was fetched and how long it stays fresh.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  data: Option<Arc<Value>>,
  fetched_at: Option<Instant>,
  /// Wall-clock counterpart of `fetched_at`, for display
  fetched_at_wall: Option<DateTime<Utc>>,
  ttl: Duration,
}

impl CacheEntry {
  pub fn new(ttl: Duration) -> Self {
    Self {
      data: None,
      fetched_at: None,
      fetched_at_wall: None,
      ttl,
    }
  }

  /// Fresh iff data is present and younger than the TTL.
  pub fn is_fresh(&self) -> bool {
    match (&self.data, self.fetched_at) {
      (Some(_), Some(fetched_at)) => fetched_at.elapsed() < self.ttl,
      _ => false,
    }
  }

  pub fn read(&self) -> (Option<Arc<Value>>, bool) {
    (self.data.clone(), self.is_fresh())
  }

  pub fn write(&mut self, data: Arc<Value>) {
    self.data = Some(data);
    self.fetched_at = Some(Instant::now());
    self.fetched_at_wall = Some(Utc::now());
  }

  pub fn clear(&mut self) {
    self.data = None;
    self.fetched_at = None;
    self.fetched_at_wall = None;
  }

  pub fn snapshot(&self) -> Option<CacheSnapshot> {
    let data = self.data.clone()?;
    let fetched_at = self.fetched_at?;
    Some(CacheSnapshot {
      data,
      fetched_at: self.fetched_at_wall.unwrap_or_else(Utc::now),
      age: fetched_at.elapsed(),
      fresh: self.is_fresh(),
    })
  }
}

/// Point-in-time view of a cache entry.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
  pub data: Arc<Value>,
  pub fetched_at: DateTime<Utc>,
  pub age: Duration,
  pub fresh: bool,
}

/// Key of a history window in the history cache.
pub fn history_key(hours: u32) -> String {
  format!("{}h", hours)
}

struct Caches {
  status: CacheEntry,
  enhanced: CacheEntry,
  history: HashMap<String, CacheEntry>,
  history_ttl: Duration,
  history_max_entries: usize,
}

impl Caches {
  fn entry(&self, endpoint: Endpoint) -> Option<&CacheEntry> {
    match endpoint {
      Endpoint::Status => Some(&self.status),
      Endpoint::Enhanced => Some(&self.enhanced),
      Endpoint::History { hours } => self.history.get(&history_key(hours)),
    }
  }

  /// Make room for a new history window by dropping the one fetched longest ago.
  fn evict_oldest_history(&mut self) {
    let oldest = self
      .history
      .iter()
      .min_by_key(|(_, entry)| entry.fetched_at)
      .map(|(key, _)| key.clone());

    if let Some(key) = oldest {
      debug!(key = %key, "evicting history window");
      self.history.remove(&key);
    }
  }
}

/// Owner of every cached dashboard payload.
///
/// All three caches sit behind one lock, so `clear` is observed all at once.
pub struct CacheStore {
  caches: Mutex<Caches>,
}

impl CacheStore {
  pub fn new(config: &CacheConfig) -> Self {
    Self {
      caches: Mutex::new(Caches {
        status: CacheEntry::new(config.status_ttl()),
        enhanced: CacheEntry::new(config.enhanced_ttl()),
        history: HashMap::new(),
        history_ttl: config.history_ttl(),
        history_max_entries: config.history_max_entries,
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Caches> {
    self.caches.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Cached value for the endpoint (possibly absent) and whether it is within its TTL.
  pub fn read(&self, endpoint: Endpoint) -> (Option<Arc<Value>>, bool) {
    self
      .lock()
      .entry(endpoint)
      .map(CacheEntry::read)
      .unwrap_or((None, false))
  }

  pub fn write(&self, endpoint: Endpoint, data: Arc<Value>) {
    let mut caches = self.lock();
    match endpoint {
      Endpoint::Status => caches.status.write(data),
      Endpoint::Enhanced => caches.enhanced.write(data),
      Endpoint::History { hours } => {
        let key = history_key(hours);
        if !caches.history.contains_key(&key)
          && caches.history_max_entries > 0
          && caches.history.len() >= caches.history_max_entries
        {
          caches.evict_oldest_history();
        }
        let ttl = caches.history_ttl;
        caches
          .history
          .entry(key)
          .or_insert_with(|| CacheEntry::new(ttl))
          .write(data);
      }
    }
  }

  pub fn snapshot(&self, endpoint: Endpoint) -> Option<CacheSnapshot> {
    self.lock().entry(endpoint).and_then(CacheEntry::snapshot)
  }

  /// Keys of the history windows currently held, sorted.
  pub fn history_keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.lock().history.keys().cloned().collect();
    keys.sort();
    keys
  }

  /// Reset every cache to empty.
  pub fn clear(&self) {
    let mut caches = self.lock();
    caches.status.clear();
    caches.enhanced.clear();
    caches.history.clear();
  }
}
