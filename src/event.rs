use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::DataKind;
use crate::dashboard::{DashboardClient, DashboardUpdate, SubscriptionId};

/// Watch-mode events
#[derive(Debug)]
pub enum Event {
  /// Fresh data delivered to a subscriber
  Update(DashboardUpdate),
  /// Periodic tick for polling the dashboard
  Tick,
}

/// Event handler that merges dashboard updates with a tick timer.
///
/// Subscribes to every data kind on creation and unsubscribes on drop.
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
  client: DashboardClient,
  subscriptions: Vec<SubscriptionId>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(client: &DashboardClient, tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let subscriptions = DataKind::ALL
      .into_iter()
      .map(|kind| {
        let tx = tx.clone();
        client.subscribe(
          kind,
          Arc::new(move |update: &DashboardUpdate| {
            // Receiver gone means the watcher is shutting down
            let _ = tx.send(Event::Update(update.clone()));
          }),
        )
      })
      .collect();

    // Spawn tick timer
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self {
      rx,
      client: client.clone(),
      subscriptions,
    }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

impl Drop for EventHandler {
  fn drop(&mut self) {
    for id in self.subscriptions.drain(..) {
      self.client.unsubscribe_id(id);
    }
  }
}
