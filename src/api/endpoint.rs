use std::fmt;
use std::str::FromStr;
use url::Url;

use super::FetchError;

/// The three kinds of dashboard data, each with its own cache and subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
  Status,
  History,
  Enhanced,
}

impl DataKind {
  pub const ALL: [DataKind; 3] = [DataKind::Status, DataKind::History, DataKind::Enhanced];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Status => "status",
      Self::History => "history",
      Self::Enhanced => "enhanced",
    }
  }
}

impl fmt::Display for DataKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Unrecognized data kind name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for DataKind {
  type Err = UnknownKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "status" => Ok(Self::Status),
      "history" => Ok(Self::History),
      "enhanced" => Ok(Self::Enhanced),
      other => Err(UnknownKind(other.to_string())),
    }
  }
}

/// A concrete remote resource: a data kind plus its request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
  Status,
  History { hours: u32 },
  Enhanced,
}

impl Endpoint {
  pub fn kind(&self) -> DataKind {
    match self {
      Self::Status => DataKind::Status,
      Self::History { .. } => DataKind::History,
      Self::Enhanced => DataKind::Enhanced,
    }
  }

  pub fn path(&self) -> &'static str {
    match self {
      Self::Status => "/api/GetVentilationStatus",
      Self::History { .. } => "/api/GetVentilationHistory",
      Self::Enhanced => "/api/GetEnhancedDashboardData",
    }
  }

  /// Key identifying this resource in the in-flight registry.
  pub fn request_key(&self) -> String {
    match self {
      Self::Status => "status".to_string(),
      Self::History { hours } => format!("history-{}", hours),
      Self::Enhanced => "enhanced".to_string(),
    }
  }

  /// Absolute request URL against `base`.
  pub fn url(&self, base: &Url) -> Result<Url, FetchError> {
    let mut url = base.join(self.path())?;
    if let Self::History { hours } = self {
      url
        .query_pairs_mut()
        .append_pair("hours", &hours.to_string());
    }
    Ok(url)
  }
}
