use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use super::FetchError;

/// Supplies the headers attached to every dashboard request.
#[async_trait]
pub trait AuthHeaders: Send + Sync {
  async fn headers(&self) -> Result<HeaderMap, FetchError>;
}

/// Sends `Authorization: Bearer <token>` when a token is configured.
#[derive(Clone, Default)]
pub struct BearerToken {
  token: Option<String>,
}

impl BearerToken {
  pub fn new(token: Option<String>) -> Self {
    Self { token }
  }
}

#[async_trait]
impl AuthHeaders for BearerToken {
  async fn headers(&self) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    if let Some(token) = &self.token {
      let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| FetchError::Auth(e.to_string()))?;
      value.set_sensitive(true);
      headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
  }
}
