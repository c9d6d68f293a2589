use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::Duration;
use url::Url;

use super::FetchError;

/// A response as seen by the dashboard client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub status_text: String,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// The HTTP client the dashboard issues its GET requests through.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, url: Url, headers: HeaderMap) -> Result<HttpResponse, FetchError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
    let mut builder = reqwest::Client::builder().gzip(true).deflate(true);
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let client = builder.build().map_err(FetchError::transport)?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn get(&self, url: Url, headers: HeaderMap) -> Result<HttpResponse, FetchError> {
    let response = self
      .client
      .get(url)
      .headers(headers)
      .send()
      .await
      .map_err(FetchError::transport)?;

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();

    // Error bodies are never parsed
    if !status.is_success() {
      return Ok(HttpResponse {
        status: status.as_u16(),
        status_text,
        body: Vec::new(),
      });
    }

    let body = response.bytes().await.map_err(FetchError::transport)?;

    Ok(HttpResponse {
      status: status.as_u16(),
      status_text,
      body: body.to_vec(),
    })
  }
}
