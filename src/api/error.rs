use std::sync::Arc;
use thiserror::Error;

/// Failure of a dashboard fetch.
///
/// Cloneable so one failed request can be handed to every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
  /// The transport could not complete the request (unreachable, aborted, ...)
  #[error("request failed: {0}")]
  Transport(Arc<dyn std::error::Error + Send + Sync>),

  /// The server answered with a non-success status
  #[error("HTTP error! status: {status} {status_text}")]
  Status { status: u16, status_text: String },

  /// The success body was not valid JSON
  #[error("failed to parse response body: {0}")]
  Decode(Arc<serde_json::Error>),

  /// The auth header supplier failed
  #[error("failed to build auth headers: {0}")]
  Auth(String),

  #[error("invalid endpoint url: {0}")]
  Url(#[from] url::ParseError),
}

impl FetchError {
  pub fn transport<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Transport(Arc::new(err))
  }

  /// HTTP status code, when the failure was a non-success response.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<serde_json::Error> for FetchError {
  fn from(err: serde_json::Error) -> Self {
    Self::Decode(Arc::new(err))
  }
}
