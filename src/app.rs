use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ventdash::event::{Event, EventHandler};
use ventdash::{DashboardClient, DashboardUpdate, Endpoint};

/// What the binary was asked to do
#[derive(Debug, Clone)]
pub enum Task {
  Status { force: bool },
  History { hours: u32, force: bool },
  Enhanced { force: bool },
  Watch { interval: Duration, hours: u32 },
}

pub struct App {
  client: DashboardClient,
}

impl App {
  pub fn new(client: DashboardClient) -> Self {
    Self { client }
  }

  pub async fn run(&self, task: Task) -> Result<()> {
    match task {
      Task::Status { force } => {
        let data = self.client.get_status_data(force).await?;
        self.print_fetched(Endpoint::Status, &data)
      }
      Task::History { hours, force } => {
        let data = self.client.get_history_data(hours, force).await?;
        self.print_fetched(Endpoint::History { hours }, &data)
      }
      Task::Enhanced { force } => {
        let data = self.client.get_enhanced_data(force).await?;
        self.print_fetched(Endpoint::Enhanced, &data)
      }
      Task::Watch { interval, hours } => self.watch(interval, hours).await,
    }
  }

  fn print_fetched(&self, endpoint: Endpoint, data: &Arc<Value>) -> Result<()> {
    if let Some(snapshot) = self.client.cached(endpoint) {
      info!(
        key = %endpoint.request_key(),
        fetched_at = %snapshot.fetched_at.to_rfc3339(),
        "cached"
      );
    }

    let rendered = serde_json::to_string_pretty(data.as_ref())
      .map_err(|e| eyre!("Failed to render response: {}", e))?;
    println!("{}", rendered);
    Ok(())
  }

  /// Poll all three endpoints on every tick and print each fresh update as a JSON line.
  async fn watch(&self, interval: Duration, hours: u32) -> Result<()> {
    let mut events = EventHandler::new(&self.client, interval);
    info!(interval_secs = interval.as_secs(), hours, "watching dashboard");

    loop {
      tokio::select! {
        event = events.next() => match event {
          Some(Event::Tick) => self.spawn_refresh(hours),
          Some(Event::Update(update)) => print_update(&update)?,
          None => break,
        },
        _ = tokio::signal::ctrl_c() => {
          info!("interrupted, stopping watch");
          break;
        }
      }
    }

    Ok(())
  }

  /// Refresh whatever has gone stale; fresh kinds are served from cache silently.
  fn spawn_refresh(&self, hours: u32) {
    let client = self.client.clone();
    tokio::spawn(async move {
      let (status, history, enhanced) = tokio::join!(
        client.get_status_data(false),
        client.get_history_data(hours, false),
        client.get_enhanced_data(false),
      );

      for (name, result) in [
        ("status", status.map(|_| ())),
        ("history", history.map(|_| ())),
        ("enhanced", enhanced.map(|_| ())),
      ] {
        if let Err(err) = result {
          warn!(kind = name, error = %err, "refresh failed");
        }
      }
    });
  }
}

fn print_update(update: &DashboardUpdate) -> Result<()> {
  let line = serde_json::json!({
    "at": Utc::now().to_rfc3339(),
    "update": update,
  });
  let rendered =
    serde_json::to_string(&line).map_err(|e| eyre!("Failed to render update: {}", e))?;
  println!("{}", rendered);
  Ok(())
}
