use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::{DataKind, Endpoint};

/// Payload handed to subscribers after a fresh fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DashboardUpdate {
  Status { data: Arc<Value> },
  /// Carries its window so subscribers can tell which history was refreshed
  History { hours: u32, data: Arc<Value> },
  Enhanced { data: Arc<Value> },
}

impl DashboardUpdate {
  pub fn new(endpoint: Endpoint, data: Arc<Value>) -> Self {
    match endpoint {
      Endpoint::Status => Self::Status { data },
      Endpoint::History { hours } => Self::History { hours, data },
      Endpoint::Enhanced => Self::Enhanced { data },
    }
  }

  pub fn kind(&self) -> DataKind {
    match self {
      Self::Status { .. } => DataKind::Status,
      Self::History { .. } => DataKind::History,
      Self::Enhanced { .. } => DataKind::Enhanced,
    }
  }

  pub fn data(&self) -> &Arc<Value> {
    match self {
      Self::Status { data } | Self::History { data, .. } | Self::Enhanced { data } => data,
    }
  }
}
