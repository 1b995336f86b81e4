//! Client context.
//!
//! [`ShopClient`] owns one session, cache, deduplicator and mutation queue,
//! and routes every request through them. Reads go cache, then deduplicator,
//! then the auth interceptor. Writes go straight to the interceptor and are
//! queued when the server cannot be reached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::api::{
    AiApi, AppointmentsApi, AuthApi, CustomersApi, EstimatesApi, HealthApi, InvoicesApi, JobsApi,
    MigrationApi, Obd2Api, VehiclesApi,
};
use crate::cache::{DEFAULT_CACHE_TTL, ResponseCache};
use crate::classify::{ApiResult, Failure, classify};
use crate::dedup::RequestDeduplicator;
use crate::error::{Error, Result};
use crate::interceptor::AuthInterceptor;
use crate::queue::{DrainReport, MutationQueue, QueuedReceipt, ReplayPolicy};
use crate::session::{
    MemorySessionStore, Session, SessionCredential, SessionEvent, SessionStore, TerminationReason,
};
use crate::transport::{
    Body, FilePart, HttpRequest, HttpResponse, RequestClass, ReqwestTransport, Timeouts, Transport,
};

/// Per-request options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub body: Option<Body>,
    pub params: Vec<(String, String)>,
    /// Overrides the key derived from path and params.
    pub cache_key: Option<String>,
    /// Reads only. Defaults to `true`.
    pub use_cache: bool,
    pub class: RequestClass,
    /// Writes only. Queue on network failure instead of failing. Defaults to `true`.
    pub queue_offline: bool,
    /// Cache pattern to invalidate after a successful write.
    pub invalidate: Option<String>,
    /// Marks a request re-issued after an authorization failure.
    pub is_retry: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            body: None,
            params: Vec::new(),
            cache_key: None,
            use_cache: true,
            class: RequestClass::Standard,
            queue_offline: true,
            invalidate: None,
            is_retry: false,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            classify(&Failure::Setup {
                detail: format!("failed to encode request body: {}", e),
            })
        })?;
        self.body = Some(Body::Json(value));
        Ok(self)
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Bypass the cache for this read.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn class(mut self, class: RequestClass) -> Self {
        self.class = class;
        self
    }

    /// Fail instead of queueing when the server is unreachable.
    pub fn no_queue(mut self) -> Self {
        self.queue_offline = false;
        self
    }

    pub fn invalidate(mut self, pattern: impl Into<String>) -> Self {
        self.invalidate = Some(pattern.into());
        self
    }

    pub fn retry(mut self) -> Self {
        self.is_retry = true;
        self
    }
}

/// A read result.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub data: Value,
    /// Whether the payload came from the cache without a network call.
    pub from_cache: bool,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// The server accepted the write; the decoded response body.
    Completed(Value),
    /// The server was unreachable; the write waits in the queue.
    Queued(QueuedReceipt),
}

impl MutationOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, MutationOutcome::Queued(_))
    }

    /// Response body, if the write completed.
    pub fn into_value(self) -> Option<Value> {
        match self {
            MutationOutcome::Completed(value) => Some(value),
            MutationOutcome::Queued(_) => None,
        }
    }

    /// Response body of a write sent without offline queueing.
    pub fn completed(self) -> ApiResult<Value> {
        match self {
            MutationOutcome::Completed(value) => Ok(value),
            MutationOutcome::Queued(receipt) => Err(classify(&Failure::Setup {
                detail: format!("write was queued as #{}", receipt.id),
            })),
        }
    }
}

/// Result of [`ShopClient::request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Fetched(Fetched),
    Completed(Value),
    Queued(QueuedReceipt),
}

impl From<MutationOutcome> for Outcome {
    fn from(outcome: MutationOutcome) -> Self {
        match outcome {
            MutationOutcome::Completed(value) => Outcome::Completed(value),
            MutationOutcome::Queued(receipt) => Outcome::Queued(receipt),
        }
    }
}

/// Build the cache key for a read: path plus query parameters sorted by name
/// and form-urlencoded.
pub fn cache_key(path: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted.into_iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish();
    format!("{}?{}", path, query)
}

fn decode(response: &HttpResponse, path: &str) -> ApiResult<Value> {
    response.json().map_err(|e| {
        classify(&Failure::Setup {
            detail: format!("invalid response body from {}: {}", path, e),
        })
    })
}

/// Deserialize a decoded payload into `T`.
pub(crate) fn decode_as<T: DeserializeOwned>(data: Value, path: &str) -> ApiResult<T> {
    serde_json::from_value(data).map_err(|e| {
        classify(&Failure::Setup {
            detail: format!("unexpected response shape from {}: {}", path, e),
        })
    })
}

fn invalidate(cache: &ResponseCache, pattern: Option<&str>) {
    let Some(pattern) = pattern else { return };
    if let Err(e) = cache.invalidate_str(pattern) {
        warn!(pattern = %pattern, error = %e, "Invalid cache invalidation pattern");
    }
}

/// Bayline shop console API client.
///
/// Cheap to clone; clones share one session, cache and queue.
///
/// # Example
///
/// ```no_run
/// use bayline_client::ShopClient;
///
/// # async fn example() -> bayline_client::Result<()> {
/// let client = ShopClient::builder()
///     .base_url("http://localhost:5000")
///     .build()?;
///
/// let jobs = client.jobs().list(&[("status", "open")]).await?;
/// println!("{}", jobs);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ShopClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    interceptor: AuthInterceptor,
    cache: ResponseCache,
    dedup: RequestDeduplicator,
    queue: MutationQueue,
    timeouts: Timeouts,
    online: AtomicBool,
    listeners: Mutex<Vec<AbortHandle>>,
    base_url: Option<String>,
}

impl ShopClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Server root, when built from a URL rather than a custom transport.
    pub fn base_url(&self) -> Option<&str> {
        self.inner.base_url.as_deref()
    }

    pub fn session(&self) -> &Arc<Session> {
        self.inner.interceptor.session()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn dedup(&self) -> &RequestDeduplicator {
        &self.inner.dedup
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.inner.queue
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.inner.timeouts
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    pub fn customers(&self) -> CustomersApi {
        CustomersApi::new(self.clone())
    }

    pub fn vehicles(&self) -> VehiclesApi {
        VehiclesApi::new(self.clone())
    }

    pub fn jobs(&self) -> JobsApi {
        JobsApi::new(self.clone())
    }

    pub fn estimates(&self) -> EstimatesApi {
        EstimatesApi::new(self.clone())
    }

    pub fn invoices(&self) -> InvoicesApi {
        InvoicesApi::new(self.clone())
    }

    pub fn appointments(&self) -> AppointmentsApi {
        AppointmentsApi::new(self.clone())
    }

    pub fn ai(&self) -> AiApi {
        AiApi::new(self.clone())
    }

    pub fn obd2(&self) -> Obd2Api {
        Obd2Api::new(self.clone())
    }

    pub fn migration(&self) -> MigrationApi {
        MigrationApi::new(self.clone())
    }

    pub fn health(&self) -> HealthApi {
        HealthApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue any request. GET is a read; every other method is a write.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<Outcome> {
        if method == Method::GET {
            self.fetch(path, options).await.map(Outcome::Fetched)
        } else {
            self.mutate(method, path, options).await.map(Outcome::from)
        }
    }

    /// Read through the cache and deduplicator.
    ///
    /// A network failure is returned as-is; reads are never queued.
    pub async fn fetch(&self, path: &str, options: RequestOptions) -> ApiResult<Fetched> {
        let key = options
            .cache_key
            .clone()
            .unwrap_or_else(|| cache_key(path, &options.params));

        if options.use_cache {
            if let Some(data) = self.inner.cache.get(&key) {
                debug!(key = %key, "Serving read from cache");
                return Ok(Fetched {
                    data,
                    from_cache: true,
                });
            }
        }

        let mut request = HttpRequest::new(
            Method::GET,
            path,
            self.inner.timeouts.for_class(options.class),
        );
        request.query = options.params;

        let interceptor = self.inner.interceptor.clone();
        let cache = self.inner.cache.clone();
        let use_cache = options.use_cache;
        let is_retry = options.is_retry;
        let store_key = key.clone();

        let data = self
            .inner
            .dedup
            .deduped_get(&key, move || {
                // A clear (logout, login, invalidation) during the read voids the store.
                let epoch = cache.epoch();
                async move {
                    let path = request.path.clone();
                    let response = interceptor.send(request, is_retry).await?;
                    let data = decode(&response, &path)?;
                    if use_cache {
                        cache.set_if_epoch(store_key, data.clone(), epoch);
                    }
                    Ok(data)
                }
            })
            .await?;

        Ok(Fetched {
            data,
            from_cache: false,
        })
    }

    /// Read and return just the payload.
    pub async fn get(&self, path: &str, options: RequestOptions) -> ApiResult<Value> {
        self.fetch(path, options).await.map(|f| f.data)
    }

    /// Read and deserialize the payload.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let data = self.get(path, options).await?;
        decode_as(data, path)
    }

    /// Send a write. Queued when the server is unreachable and
    /// `queue_offline` is set.
    pub async fn mutate(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> ApiResult<MutationOutcome> {
        let mut request = HttpRequest::new(
            method,
            path,
            self.inner.timeouts.for_class(options.class),
        );
        request.query = options.params;
        request.body = options.body;
        let queued_copy = options.queue_offline.then(|| request.clone());

        match self.inner.interceptor.send(request, options.is_retry).await {
            Ok(response) => {
                let data = decode(&response, path)?;
                invalidate(&self.inner.cache, options.invalidate.as_deref());
                Ok(MutationOutcome::Completed(data))
            }
            Err(e) if e.is_network() => match queued_copy {
                Some(request) => {
                    self.mark_offline();
                    let receipt = self
                        .inner
                        .queue
                        .enqueue(request, options.class, options.invalidate);
                    Ok(MutationOutcome::Queued(receipt))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> ApiResult<MutationOutcome> {
        self.mutate(Method::POST, path, options).await
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> ApiResult<MutationOutcome> {
        self.mutate(Method::PUT, path, options).await
    }

    pub async fn patch(&self, path: &str, options: RequestOptions) -> ApiResult<MutationOutcome> {
        self.mutate(Method::PATCH, path, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> ApiResult<MutationOutcome> {
        self.mutate(Method::DELETE, path, options).await
    }

    /// POST a multipart upload with the upload timeout. Uploads are never queued.
    pub async fn upload(
        &self,
        path: &str,
        files: Vec<FilePart>,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        let options = options
            .body(Body::Multipart(files))
            .class(RequestClass::Upload)
            .no_queue();
        self.mutate(Method::POST, path, options).await?.completed()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connectivity and queue
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    fn mark_offline(&self) {
        if self.inner.online.swap(false, Ordering::AcqRel) {
            info!("Server unreachable, switching to offline mode");
        }
    }

    /// Record a connectivity change. Going from offline to online drains the
    /// queue and returns the drain report.
    pub async fn set_online(&self, online: bool) -> Option<DrainReport> {
        let was_online = self.inner.online.swap(online, Ordering::AcqRel);
        match (was_online, online) {
            (false, true) => Some(self.drain_queue().await),
            (true, false) => {
                info!(queued = self.inner.queue.len(), "Connectivity lost");
                None
            }
            _ => None,
        }
    }

    /// Replay queued writes in order. Halts at the first failure.
    pub async fn drain_queue(&self) -> DrainReport {
        let interceptor = &self.inner.interceptor;
        let cache = &self.inner.cache;
        let timeouts = self.inner.timeouts;

        let report = self
            .inner
            .queue
            .drain(|mutation| async move {
                let request = mutation.to_request(timeouts.for_class(mutation.class));
                let response = interceptor.send(request, false).await?;
                decode(&response, &mutation.path)?;
                invalidate(cache, mutation.invalidate.as_deref());
                Ok(())
            })
            .await;

        if let DrainReport::Halted { error, .. } = &report {
            if error.is_network() {
                self.mark_offline();
            }
        }
        report
    }

    /// Follow a connectivity signal. Each offline-to-online transition
    /// drains the queue. The task stops when the sender is dropped, the
    /// client is dropped, or [`ShopClient::dispose`] is called.
    pub fn watch_connectivity(&self, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let weak: Weak<ClientInner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut current = *signal.borrow_and_update();
            if let Some(inner) = weak.upgrade() {
                ShopClient { inner }.set_online(current).await;
            }

            while signal.changed().await.is_ok() {
                let online = *signal.borrow_and_update();
                if online == current {
                    continue;
                }
                current = online;
                let Some(inner) = weak.upgrade() else { break };
                let client = ShopClient { inner };
                if let Some(report) = client.set_online(online).await {
                    debug!(replayed = report.replayed(), "Reconnect drain finished");
                }
            }
            debug!("Connectivity watcher stopped");
        });
        self.inner.listeners.lock().push(handle.abort_handle());
        handle
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session
    // ─────────────────────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session().subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Destroy the local credential and drop cached data.
    pub fn invalidate_session(&self) -> bool {
        let ended = self.session().clear(TerminationReason::Invalidated);
        self.inner.cache.clear();
        ended
    }

    /// Stop background listeners and drop cached and queued data.
    pub fn dispose(&self) {
        let listeners: Vec<AbortHandle> = self.inner.listeners.lock().drain(..).collect();
        for listener in &listeners {
            listener.abort();
        }
        self.inner.cache.clear();
        let dropped = self.inner.queue.clear();
        info!(listeners = listeners.len(), dropped, "Client disposed");
    }
}

impl std::fmt::Debug for ShopClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopClient")
            .field("base_url", &self.inner.base_url)
            .field("online", &self.is_online())
            .field("cache", &self.inner.cache.stats())
            .field("queued", &self.inner.queue.len())
            .finish()
    }
}

/// Builder for [`ShopClient`].
pub struct ClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    timeouts: Timeouts,
    cache_ttl: Duration,
    replay_policy: ReplayPolicy,
    session_store: Option<Arc<dyn SessionStore>>,
    transport: Option<Arc<dyn Transport>>,
    user_agent: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            timeouts: Timeouts::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            replay_policy: ReplayPolicy::default(),
            session_store: None,
            transport: None,
            user_agent: None,
        }
    }

    /// Server root, e.g. `http://localhost:5000`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Start with this bearer token, replacing any persisted session.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn replay_policy(mut self, policy: ReplayPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    /// Where the session credential is persisted. Defaults to memory only.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Use a custom transport instead of `reqwest`. `base_url` is then optional.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client and rehydrate any persisted session.
    pub fn build(self) -> Result<ShopClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let base_url = self
                    .base_url
                    .as_deref()
                    .ok_or_else(|| Error::Config("base_url is required".to_string()))?;
                Arc::new(ReqwestTransport::new(base_url, self.user_agent)?)
            }
        };

        let store = self
            .session_store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let session = Arc::new(Session::new(store));
        session.rehydrate()?;
        if let Some(token) = self.auth_token {
            session.establish(SessionCredential::new(token, Value::Null))?;
        }

        Ok(ShopClient {
            inner: Arc::new(ClientInner {
                interceptor: AuthInterceptor::new(transport, session),
                cache: ResponseCache::new(self.cache_ttl),
                dedup: RequestDeduplicator::new(),
                queue: MutationQueue::new(self.replay_policy),
                timeouts: self.timeouts,
                online: AtomicBool::new(true),
                listeners: Mutex::new(Vec::new()),
                base_url: self.base_url,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
