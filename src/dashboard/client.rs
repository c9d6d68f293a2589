//! Cached, deduplicating client for the dashboard API.

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::{
  AuthHeaders, BearerToken, DataKind, Endpoint, FetchError, ReqwestTransport, Transport,
};
use crate::cache::{CacheSnapshot, CacheStore, InFlight, SharedFetch};
use crate::config::Config;

use super::{Callback, DashboardUpdate, SubscriptionId, Subscribers};

/// Dashboard data-access client.
///
/// Each accessor serves fresh cached data when it can, otherwise joins or
/// starts a single network fetch for its endpoint. A successful fetch updates
/// the cache and notifies that kind's subscribers exactly once, however many
/// callers were waiting on it.
///
/// Cloning is cheap; clones share cache, in-flight requests and subscribers.
#[derive(Clone)]
pub struct DashboardClient {
  base_url: Arc<Url>,
  transport: Arc<dyn Transport>,
  auth: Arc<dyn AuthHeaders>,
  cache: Arc<CacheStore>,
  in_flight: Arc<InFlight>,
  subscribers: Arc<Subscribers>,
  default_history_hours: u32,
}

impl DashboardClient {
  /// Create a client with explicit transport and auth header supplier.
  pub fn new(
    config: &Config,
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthHeaders>,
  ) -> Result<Self, FetchError> {
    let base_url = Url::parse(&config.api.base_url)?;

    Ok(Self {
      base_url: Arc::new(base_url),
      transport,
      auth,
      cache: Arc::new(CacheStore::new(&config.cache)),
      in_flight: Arc::new(InFlight::new()),
      subscribers: Arc::new(Subscribers::new()),
      default_history_hours: config.cache.default_history_hours,
    })
  }

  /// Create a client talking HTTP through `reqwest`, authenticated with the
  /// token from the environment (if any).
  pub fn from_config(config: &Config) -> Result<Self> {
    let transport = ReqwestTransport::new(config.http.timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    let auth = BearerToken::new(Config::get_api_token());

    Self::new(config, Arc::new(transport), Arc::new(auth))
      .map_err(|e| eyre!("Invalid base url {}: {}", config.api.base_url, e))
  }

  pub async fn get_status_data(&self, force_refresh: bool) -> Result<Arc<Value>, FetchError> {
    self.get(Endpoint::Status, force_refresh).await
  }

  pub async fn get_history_data(
    &self,
    hours: u32,
    force_refresh: bool,
  ) -> Result<Arc<Value>, FetchError> {
    self.get(Endpoint::History { hours }, force_refresh).await
  }

  /// History for the configured default window (24 hours unless overridden).
  pub async fn get_history_default(&self, force_refresh: bool) -> Result<Arc<Value>, FetchError> {
    self
      .get_history_data(self.default_history_hours, force_refresh)
      .await
  }

  pub async fn get_enhanced_data(&self, force_refresh: bool) -> Result<Arc<Value>, FetchError> {
    self.get(Endpoint::Enhanced, force_refresh).await
  }

  /// Cache-first read for one endpoint.
  ///
  /// 1. Unless forced, return cached data that is still within its TTL
  /// 2. Otherwise join or start the deduplicated fetch
  /// 3. A failed fetch leaves the cache as it was
  async fn get(&self, endpoint: Endpoint, force_refresh: bool) -> Result<Arc<Value>, FetchError> {
    if !force_refresh {
      if let (Some(data), true) = self.cache.read(endpoint) {
        debug!(key = %endpoint.request_key(), "cache hit");
        return Ok(data);
      }
    }

    self.deduped_fetch(endpoint).await
  }

  fn deduped_fetch(&self, endpoint: Endpoint) -> SharedFetch {
    let key = endpoint.request_key();
    let (fetch, _joined) = self.in_flight.join_or_start(&key, || {
      let client = self.clone();
      async move { client.fetch_and_publish(endpoint).await }
    });
    fetch
  }

  async fn fetch_and_publish(&self, endpoint: Endpoint) -> Result<Arc<Value>, FetchError> {
    match self.fetch(endpoint).await {
      Ok(data) => {
        self.cache.write(endpoint, Arc::clone(&data));
        self
          .subscribers
          .notify(&DashboardUpdate::new(endpoint, Arc::clone(&data)));
        Ok(data)
      }
      Err(err) => {
        warn!(key = %endpoint.request_key(), error = %err, "fetch failed");
        Err(err)
      }
    }
  }

  async fn fetch(&self, endpoint: Endpoint) -> Result<Arc<Value>, FetchError> {
    let url = endpoint.url(&self.base_url)?;
    let headers = self.auth.headers().await?;

    info!(url = %url, "fetching");
    let response = self.transport.get(url, headers).await?;

    if !response.is_success() {
      return Err(FetchError::Status {
        status: response.status,
        status_text: response.status_text,
      });
    }

    let data: Value = serde_json::from_slice(&response.body)?;
    Ok(Arc::new(data))
  }

  pub fn subscribe(&self, kind: DataKind, callback: Callback) -> SubscriptionId {
    self.subscribers.subscribe(kind, callback)
  }

  /// Subscribe by kind name; unrecognized names are a no-op returning `None`.
  pub fn subscribe_named(&self, kind: &str, callback: Callback) -> Option<SubscriptionId> {
    self.subscribers.subscribe_named(kind, callback)
  }

  pub fn unsubscribe(&self, kind: DataKind, callback: &Callback) -> bool {
    self.subscribers.unsubscribe(kind, callback)
  }

  pub fn unsubscribe_id(&self, id: SubscriptionId) -> bool {
    self.subscribers.unsubscribe_id(id)
  }

  pub fn subscriber_count(&self, kind: DataKind) -> usize {
    self.subscribers.count(kind)
  }

  /// Drop every cached payload; the next read of any kind hits the network.
  pub fn clear_cache(&self) {
    info!("clearing dashboard cache");
    self.cache.clear();
  }

  /// What is currently cached for `endpoint`, fresh or not.
  pub fn cached(&self, endpoint: Endpoint) -> Option<CacheSnapshot> {
    self.cache.snapshot(endpoint)
  }

  pub fn cached_history_windows(&self) -> Vec<String> {
    self.cache.history_keys()
  }

  /// Whether a fetch for `endpoint` is currently pending.
  pub fn is_in_flight(&self, endpoint: Endpoint) -> bool {
    self.in_flight.contains(&endpoint.request_key())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::ScriptedTransport;
  use serde_json::json;
  use std::sync::Mutex;
  use std::time::Duration;

  fn client_with(transport: &Arc<ScriptedTransport>) -> DashboardClient {
    let config = Config::default();
    DashboardClient::new(
      &config,
      Arc::clone(transport) as Arc<dyn Transport>,
      Arc::new(BearerToken::default()),
    )
    .unwrap()
  }

  fn setup() -> (Arc<ScriptedTransport>, DashboardClient) {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(&transport);
    (transport, client)
  }

  fn collect_updates(client: &DashboardClient, kind: DataKind) -> Arc<Mutex<Vec<DashboardUpdate>>> {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&updates);
    client.subscribe(
      kind,
      Arc::new(move |update: &DashboardUpdate| sink.lock().unwrap().push(update.clone())),
    );
    updates
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_cache_skips_network() {
    let (transport, client) = setup();

    let first = client.get_status_data(false).await.unwrap();
    let second = client.get_status_data(false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(transport.calls(), 1);

    client.get_enhanced_data(false).await.unwrap();
    client.get_enhanced_data(false).await.unwrap();
    client.get_history_data(24, false).await.unwrap();
    client.get_history_data(24, false).await.unwrap();
    assert_eq!(transport.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_cache_fetches_once() {
    let (transport, client) = setup();

    client.get_status_data(false).await.unwrap();
    tokio::time::advance(Duration::from_millis(30_000)).await;
    let refreshed = client.get_status_data(false).await.unwrap();
    assert_eq!(transport.calls(), 2);
    assert_eq!(refreshed["call"], 2);

    client.get_history_data(24, false).await.unwrap();
    tokio::time::advance(Duration::from_millis(44_999)).await;
    client.get_history_data(24, false).await.unwrap();
    assert_eq!(transport.calls(), 3);
    tokio::time::advance(Duration::from_millis(1)).await;
    client.get_history_data(24, false).await.unwrap();
    assert_eq!(transport.calls(), 4);
  }

  #[tokio::test(start_paused = true)]
  async fn test_force_refresh_bypasses_cache() {
    let (transport, client) = setup();
    client.get_enhanced_data(false).await.unwrap();
    let forced = client.get_enhanced_data(true).await.unwrap();
    assert_eq!(transport.calls(), 2);
    assert_eq!(forced["call"], 2);

    // The forced result replaced the cached one
    let cached = client.get_enhanced_data(false).await.unwrap();
    assert_eq!(cached["call"], 2);
  }

  #[tokio::test]
  async fn test_concurrent_callers_share_one_request() {
    let transport = Arc::new(ScriptedTransport::held());
    let client = client_with(&transport);

    let calls = (0..5).map(|_| client.get_status_data(false));
    let (results, ()) = tokio::join!(futures::future::join_all(calls), async {
      tokio::task::yield_now().await;
      transport.release();
    });

    assert_eq!(transport.calls(), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
      assert_eq!(result.as_ref().unwrap(), first);
    }
  }

  #[tokio::test]
  async fn test_concurrent_callers_share_one_error() {
    let transport = Arc::new(ScriptedTransport::held());
    transport.push_status(502, "Bad Gateway");
    let client = client_with(&transport);

    let calls = (0..3).map(|_| client.get_enhanced_data(false));
    let (results, ()) = tokio::join!(futures::future::join_all(calls), async {
      tokio::task::yield_now().await;
      transport.release();
    });

    assert_eq!(transport.calls(), 1);
    for result in results {
      assert_eq!(result.unwrap_err().status(), Some(502));
    }
  }

  #[tokio::test]
  async fn test_in_flight_entry_removed_after_settle() {
    let (transport, client) = setup();
    transport.push_refused();

    assert!(client.get_status_data(false).await.is_err());
    assert!(!client.is_in_flight(Endpoint::Status));

    client.get_status_data(true).await.unwrap();
    assert!(!client.is_in_flight(Endpoint::Status));
    client.get_status_data(true).await.unwrap();
    assert_eq!(transport.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribers_notified_on_fetch_not_on_hit() {
    let (_transport, client) = setup();
    let updates = collect_updates(&client, DataKind::Status);

    let data = client.get_status_data(false).await.unwrap();
    client.get_status_data(false).await.unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0], DashboardUpdate::Status { data });
  }

  #[tokio::test]
  async fn test_joined_callers_notify_once() {
    let transport = Arc::new(ScriptedTransport::held());
    let client = client_with(&transport);
    let updates = collect_updates(&client, DataKind::Enhanced);

    let calls = (0..4).map(|_| client.get_enhanced_data(false));
    let _ = tokio::join!(futures::future::join_all(calls), async {
      tokio::task::yield_now().await;
      transport.release();
    });

    assert_eq!(updates.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_history_update_carries_hours() {
    let (_transport, client) = setup();
    let updates = collect_updates(&client, DataKind::History);
    let status_updates = collect_updates(&client, DataKind::Status);

    client.get_history_data(48, false).await.unwrap();

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    match &updates[0] {
      DashboardUpdate::History { hours, data } => {
        assert_eq!(*hours, 48);
        assert_eq!(data["query"], "hours=48");
      }
      other => panic!("unexpected update {:?}", other),
    }
    assert!(status_updates.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_registered_twice_unsubscribed_once_fires_once() {
    let (_transport, client) = setup();
    let hits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&hits);
    let callback: Callback = Arc::new(move |_update: &DashboardUpdate| {
      *counter.lock().unwrap() += 1;
    });

    client.subscribe(DataKind::Status, Arc::clone(&callback));
    client.subscribe(DataKind::Status, Arc::clone(&callback));
    assert!(client.unsubscribe(DataKind::Status, &callback));

    client.get_status_data(true).await.unwrap();
    assert_eq!(*hits.lock().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_subscriber_panic_does_not_affect_caller() {
    let (_transport, client) = setup();
    client.subscribe(
      DataKind::Status,
      Arc::new(|_update: &DashboardUpdate| panic!("listener failure")),
    );
    let updates = collect_updates(&client, DataKind::Status);

    let data = client.get_status_data(false).await.unwrap();
    assert_eq!(data["call"], 1);
    assert_eq!(updates.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_unknown_kind_subscription_is_noop() {
    let (_transport, client) = setup();
    let id = client.subscribe_named("alarms", Arc::new(|_update: &DashboardUpdate| {}));
    assert!(id.is_none());
    client.get_status_data(false).await.unwrap();
  }

  #[tokio::test(start_paused = true)]
  async fn test_clear_cache_forces_refetch() {
    let (transport, client) = setup();
    client.get_status_data(false).await.unwrap();
    client.get_history_data(24, false).await.unwrap();
    client.get_enhanced_data(false).await.unwrap();
    assert_eq!(transport.calls(), 3);

    client.clear_cache();
    assert!(client.cached(Endpoint::Status).is_none());
    assert!(client.cached_history_windows().is_empty());

    client.get_status_data(false).await.unwrap();
    client.get_history_data(24, false).await.unwrap();
    client.get_enhanced_data(false).await.unwrap();
    assert_eq!(transport.calls(), 6);
  }

  #[tokio::test(start_paused = true)]
  async fn test_history_windows_cached_independently() {
    let (transport, client) = setup();
    let day = client.get_history_data(24, false).await.unwrap();
    client.get_history_data(48, false).await.unwrap();
    assert_eq!(client.cached_history_windows(), vec!["24h", "48h"]);

    client.get_history_data(48, true).await.unwrap();
    let day_again = client.get_history_data(24, false).await.unwrap();
    assert_eq!(day, day_again);
    assert_eq!(transport.calls(), 3);

    let urls = transport.urls();
    assert_eq!(urls[0].query(), Some("hours=24"));
    assert_eq!(urls[1].query(), Some("hours=48"));
  }

  #[tokio::test]
  async fn test_default_history_window_is_24_hours() {
    let (transport, client) = setup();
    client.get_history_default(false).await.unwrap();
    assert_eq!(
      transport.urls()[0].as_str(),
      "http://localhost:7071/api/GetVentilationHistory?hours=24"
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_status_leaves_cache_untouched() {
    let (transport, client) = setup();
    let updates = collect_updates(&client, DataKind::Status);

    transport.push_status(500, "Internal Server Error");
    let err = client.get_status_data(false).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(client.cached(Endpoint::Status).is_none());

    let good = client.get_status_data(false).await.unwrap();
    transport.push_status(500, "Internal Server Error");
    let err = client.get_status_data(true).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    assert_eq!(client.cached(Endpoint::Status).unwrap().data, good);

    // Still fresh, so served from cache
    assert_eq!(client.get_status_data(false).await.unwrap(), good);
    assert_eq!(updates.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_invalid_json_is_decode_error() {
    let (transport, client) = setup();
    transport.push_body("<html>not json</html>");
    let err = client.get_enhanced_data(false).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
    assert!(client.cached(Endpoint::Enhanced).is_none());
  }

  #[tokio::test]
  async fn test_transport_error_propagates() {
    let (transport, client) = setup();
    transport.push_refused();
    let err = client.get_history_data(12, false).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(err.to_string().contains("connection refused"));
  }
}
