//! Registry of pending fetches, so concurrent requests for one key share a single call.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::api::FetchError;

/// A fetch every joined caller awaits; all of them observe the same outcome.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, FetchError>>>;

/// Maps a request key to the fetch currently running for it.
///
/// At most one entry exists per key. The entry is removed as soon as the fetch
/// settles, before any caller sees the result.
#[derive(Default)]
pub struct InFlight {
  pending: Mutex<HashMap<String, SharedFetch>>,
}

impl InFlight {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedFetch>> {
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Join the fetch pending for `key`, or start one with `start`.
  ///
  /// The started fetch runs on its own task, so it completes (and is
  /// unregistered) even if every caller stops waiting. Returns `true` alongside
  /// the fetch when an existing one was joined.
  pub fn join_or_start<F, Fut>(self: &Arc<Self>, key: &str, start: F) -> (SharedFetch, bool)
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<Value>, FetchError>> + Send + 'static,
  {
    let mut pending = self.lock();
    if let Some(existing) = pending.get(key) {
      debug!(key, "joining in-flight request");
      return (existing.clone(), true);
    }

    let registry = Arc::clone(self);
    let owned_key = key.to_string();
    let fetch = start();
    // The task cannot unregister before we insert: `remove` waits on this lock
    let task = tokio::spawn(async move {
      let result = fetch.await;
      registry.remove(&owned_key);
      result
    });

    let shared = async move {
      match task.await {
        Ok(result) => result,
        Err(join_err) => Err(FetchError::transport(join_err)),
      }
    }
    .boxed()
    .shared();

    pending.insert(key.to_string(), shared.clone());
    (shared, false)
  }

  fn remove(&self, key: &str) {
    self.lock().remove(key);
  }

  pub fn contains(&self, key: &str) -> bool {
    self.lock().contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
