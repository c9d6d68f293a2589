use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::error;

use super::DashboardUpdate;
use crate::api::DataKind;

/// Listener for fresh data of one kind.
pub type Callback = Arc<dyn Fn(&DashboardUpdate) + Send + Sync>;

/// Handle returned by `subscribe`, usable to remove exactly that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-kind ordered listener lists.
#[derive(Default)]
pub struct Subscribers {
  next_id: AtomicU64,
  lists: Mutex<HashMap<DataKind, Vec<(SubscriptionId, Callback)>>>,
}

impl Subscribers {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<DataKind, Vec<(SubscriptionId, Callback)>>> {
    self.lists.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn subscribe(&self, kind: DataKind, callback: Callback) -> SubscriptionId {
    let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.lock().entry(kind).or_default().push((id, callback));
    id
  }

  /// Subscribe by kind name. Unrecognized names are ignored.
  pub fn subscribe_named(&self, kind: &str, callback: Callback) -> Option<SubscriptionId> {
    let kind: DataKind = kind.parse().ok()?;
    Some(self.subscribe(kind, callback))
  }

  /// Remove the first registration of `callback` (by identity) for `kind`.
  pub fn unsubscribe(&self, kind: DataKind, callback: &Callback) -> bool {
    let mut lists = self.lock();
    let Some(list) = lists.get_mut(&kind) else {
      return false;
    };
    match list.iter().position(|(_, cb)| Arc::ptr_eq(cb, callback)) {
      Some(index) => {
        list.remove(index);
        true
      }
      None => false,
    }
  }

  pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
    let mut lists = self.lock();
    for list in lists.values_mut() {
      if let Some(index) = list.iter().position(|(sub, _)| *sub == id) {
        list.remove(index);
        return true;
      }
    }
    false
  }

  pub fn count(&self, kind: DataKind) -> usize {
    self.lock().get(&kind).map_or(0, Vec::len)
  }

  /// Invoke every listener for the update's kind, in registration order.
  ///
  /// Listeners run outside the lock. A panicking listener is logged and skipped.
  pub fn notify(&self, update: &DashboardUpdate) {
    let kind = update.kind();
    let callbacks: Vec<Callback> = self
      .lock()
      .get(&kind)
      .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
      .unwrap_or_default();

    for callback in callbacks {
      if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(update))) {
        error!(
          kind = %kind,
          "subscriber callback panicked: {}",
          panic_message(payload.as_ref())
        );
      }
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
  if let Some(s) = payload.downcast_ref::<&str>() {
    s
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s
  } else {
    "<non-string panic payload>"
  }
}
