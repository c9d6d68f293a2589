//! Scripted in-memory transport for exercising the client without a network.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use url::Url;

use super::{FetchError, HttpResponse, Transport};

enum Scripted {
  Response(HttpResponse),
  Refused,
}

/// Answers every GET with `{"call": n, "path": ..., "query": ...}` unless a
/// response was queued. Can hold all requests until [`release`](Self::release).
pub struct ScriptedTransport {
  calls: AtomicUsize,
  urls: Mutex<Vec<Url>>,
  queued: Mutex<VecDeque<Scripted>>,
  gate: watch::Sender<bool>,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self {
      calls: AtomicUsize::new(0),
      urls: Mutex::new(Vec::new()),
      queued: Mutex::new(VecDeque::new()),
      gate: watch::Sender::new(true),
    }
  }

  /// Requests block until `release` is called.
  pub fn held() -> Self {
    let transport = Self::new();
    transport.gate.send_replace(false);
    transport
  }

  pub fn release(&self) {
    self.gate.send_replace(true);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn urls(&self) -> Vec<Url> {
    self.urls.lock().unwrap().clone()
  }

  pub fn push_status(&self, status: u16, status_text: &str) {
    self.queued.lock().unwrap().push_back(Scripted::Response(HttpResponse {
      status,
      status_text: status_text.to_string(),
      body: Vec::new(),
    }));
  }

  pub fn push_body(&self, body: &str) {
    self.queued.lock().unwrap().push_back(Scripted::Response(HttpResponse {
      status: 200,
      status_text: "OK".to_string(),
      body: body.as_bytes().to_vec(),
    }));
  }

  pub fn push_refused(&self) {
    self.queued.lock().unwrap().push_back(Scripted::Refused);
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn get(&self, url: Url, _headers: HeaderMap) -> Result<HttpResponse, FetchError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    self.urls.lock().unwrap().push(url.clone());

    let mut gate = self.gate.subscribe();
    gate
      .wait_for(|open| *open)
      .await
      .map_err(FetchError::transport)?;

    let next = self.queued.lock().unwrap().pop_front();
    match next {
      Some(Scripted::Response(response)) => Ok(response),
      Some(Scripted::Refused) => Err(FetchError::transport(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
      ))),
      None => {
        let body = serde_json::json!({
          "call": call,
          "path": url.path(),
          "query": url.query(),
        });
        Ok(HttpResponse {
          status: 200,
          status_text: "OK".to_string(),
          body: serde_json::to_vec(&body)?,
        })
      }
    }
  }
}
