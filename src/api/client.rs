//! StockChat service client
//!
//! `StockClient` is the entry point for all service calls. Read operations go
//! through the cache and are coalesced with identical in-flight reads;
//! analysis submissions always hit the network.

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::inflight::{InFlightRegistry, Slot};
use super::{ApiError, RequestFingerprint, RetryPolicy, Transport};
use crate::cache::{CacheError, CacheStore};
use crate::config::ClientConfig;
use crate::data::{AnalysisRequest, ApiResponse};

/// Path of the default series and of analysis submissions
const STOCK_PATH: &str = "/stock";

/// Prefix for shared analyses
const SHARE_PATH: &str = "/stock/share";

/// One logical request against the service
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
}

impl ApiRequest {
    fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    fn fingerprint(&self) -> RequestFingerprint {
        RequestFingerprint::new(&self.path, self.body.as_ref())
    }
}

/// State shared by every clone of a client
#[derive(Debug)]
struct Inner {
    transport: Transport,
    retry: RetryPolicy,
    cache: CacheStore<ApiResponse>,
    in_flight: Arc<InFlightRegistry<ApiResponse>>,
}

impl Inner {
    /// Runs the retry policy over the transport for `request`
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let transport = &self.transport;
        self.retry
            .run(
                move |attempt| {
                    tracing::debug!(
                        method = %request.method,
                        path = %request.path,
                        attempt,
                        "calling service"
                    );
                    transport.call(request.method.clone(), &request.path, request.body.as_ref())
                },
                ApiError::is_retryable,
            )
            .await
    }
}

/// Client for the StockChat analysis service
///
/// Cloning is cheap and every clone shares the same cache and in-flight
/// registry, so construct one per process and hand clones to call sites.
#[derive(Debug, Clone)]
pub struct StockClient {
    inner: Arc<Inner>,
}

impl StockClient {
    /// Creates a client from configuration
    ///
    /// The cache persists under `config.cache_namespace_dir()` when a cache
    /// directory is configured and stays in memory otherwise.
    pub fn new(config: &ClientConfig) -> Self {
        let cache = match config.cache_namespace_dir() {
            Some(dir) => CacheStore::with_dir(dir),
            None => CacheStore::in_memory(),
        };
        let ttl = chrono::Duration::from_std(config.cache_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(crate::cache::DEFAULT_TTL_SECS));

        Self::with_parts(
            Transport::new(config.api_base.clone(), config.timeout),
            config.retry,
            cache.with_ttl(ttl),
        )
    }

    /// Creates a client from explicitly built components
    pub fn with_parts(
        transport: Transport,
        retry: RetryPolicy,
        cache: CacheStore<ApiResponse>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                retry,
                cache,
                in_flight: Arc::new(InFlightRegistry::new()),
            }),
        }
    }

    /// Fetches the default series and commentary (`GET /stock`)
    pub async fn fetch_initial_stock(&self) -> Result<ApiResponse, ApiError> {
        self.fetch_cached(ApiRequest::get(STOCK_PATH)).await
    }

    /// Fetches a previously computed analysis by share id
    /// (`GET /stock/share/{id}`)
    ///
    /// # Returns
    /// * `Ok(ApiResponse)` - the stored analysis
    /// * `Err(ApiError::Status { status: 404, .. })` - unknown id, never retried
    /// * `Err(ApiError::InvalidRequest)` - blank id or `.`/`..`, nothing sent
    pub async fn fetch_shared_analysis(&self, share_id: &str) -> Result<ApiResponse, ApiError> {
        let share_id = share_id.trim();
        if share_id.is_empty() {
            return Err(ApiError::InvalidRequest {
                message: "share id must not be empty".to_string(),
            });
        }
        // Dot segments survive percent-encoding and would be resolved away
        // by the URL parser, landing on a different endpoint.
        if share_id == "." || share_id == ".." {
            return Err(ApiError::InvalidRequest {
                message: format!("'{}' is not a valid share id", share_id),
            });
        }
        let path = format!("{}/{}", SHARE_PATH, urlencoding::encode(share_id));
        self.fetch_cached(ApiRequest::get(path)).await
    }

    /// Submits a question for fresh analysis (`POST /stock`)
    ///
    /// Never cached and never coalesced: every call creates a new analysis
    /// with its own share id, even for identical text.
    pub async fn analyze_stock(&self, message: &str) -> Result<ApiResponse, ApiError> {
        if message.trim().is_empty() {
            return Err(ApiError::InvalidRequest {
                message: "message must not be empty".to_string(),
            });
        }
        let body = serde_json::to_value(AnalysisRequest {
            message: message.to_string(),
        })
        .map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;

        let request = ApiRequest::post(STOCK_PATH, body);
        tracing::debug!(path = STOCK_PATH, "submitting analysis");
        self.inner.send(&request).await
    }

    /// Drops every cached response
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        self.inner.cache.clear()
    }

    /// The response cache
    pub fn cache(&self) -> &CacheStore<ApiResponse> {
        &self.inner.cache
    }

    /// Number of reads currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Cache, then in-flight registry, then network
    ///
    /// The owning sequence runs as its own task: callers that stop waiting
    /// do not cancel it, and it still fills the cache for whoever asks next.
    async fn fetch_cached(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let key = request.fingerprint();

        if let Some(hit) = self.inner.cache.get(&key) {
            return Ok(hit.data);
        }

        let ticket = match self.inner.in_flight.acquire(&key) {
            Slot::Joined(outcome) => return outcome.await,
            Slot::Owner(ticket) => ticket,
        };
        let outcome = ticket.outcome();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // A sequence that finished between our cache miss and acquire
            // has already stored its result.
            let result = match inner.cache.get(ticket.key()) {
                Some(hit) => Ok(hit.data),
                None => {
                    tracing::debug!(fingerprint = %ticket.key(), path = %request.path, "cache miss");
                    let result = inner.send(&request).await;
                    if let Ok(response) = &result {
                        if let Err(e) = inner.cache.put(ticket.key(), response) {
                            tracing::warn!(error = %e, "failed to persist cache entry");
                        }
                    }
                    result
                }
            };
            ticket.complete(result);
        });

        outcome.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_client() -> StockClient {
        // Nothing listens on port 9; these tests never reach the network
        StockClient::with_parts(
            Transport::new("http://127.0.0.1:9", Duration::from_millis(50)),
            RetryPolicy::new(1, Duration::ZERO),
            CacheStore::in_memory(),
        )
    }

    #[test]
    fn test_request_fingerprints() {
        let a = ApiRequest::get("/stock").fingerprint();
        let b = ApiRequest::get("/stock/share/abc").fingerprint();
        let c = ApiRequest::post("/stock", serde_json::json!({ "message": "AAPL" })).fingerprint();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, RequestFingerprint::new("/stock", None));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_locally() {
        let client = offline_client();

        for message in ["", "   ", "\n\t"] {
            let err = client.analyze_stock(message).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest { .. }));
        }
    }

    #[tokio::test]
    async fn test_blank_share_id_is_rejected_locally() {
        let client = offline_client();
        let err = client.fetch_shared_analysis("  ").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_cached_response_is_served_without_network() {
        let client = offline_client();
        let cached: ApiResponse = serde_json::from_value(serde_json::json!({
            "stockData": [],
            "analysisText": {
                "summary": "cached", "technicalFactors": [], "fundamentalFactors": [],
                "outlook": "flat", "timestamp": "2024-01-01T00:00:00"
            }
        }))
        .unwrap();
        client
            .cache()
            .put(&RequestFingerprint::new("/stock", None), &cached)
            .unwrap();

        let response = client.fetch_initial_stock().await.expect("cache hit");
        assert_eq!(response, cached);
        assert_eq!(client.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_uses_entry_stored_after_its_cache_miss() {
        let client = offline_client();
        let key = RequestFingerprint::new("/stock", None);
        let stored: ApiResponse = serde_json::from_value(serde_json::json!({
            "stockData": [],
            "analysisText": {
                "summary": "stored meanwhile", "outlook": "flat",
                "timestamp": "2024-01-01T00:00:00"
            }
        }))
        .unwrap();

        // First poll misses the cache, takes ownership and spawns the
        // sequence; on this single-threaded runtime it has not run yet.
        let mut fetch = Box::pin(client.fetch_initial_stock());
        assert!(futures::poll!(&mut fetch).is_pending());
        assert_eq!(client.in_flight_count(), 1);

        client.cache().put(&key, &stored).unwrap();

        // The offline transport would fail, so Ok means nothing was sent
        assert_eq!(fetch.await, Ok(stored));
        assert_eq!(client.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_dot_share_ids_are_rejected_locally() {
        let client = offline_client();
        for id in [".", ".."] {
            let err = client.fetch_shared_analysis(id).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidRequest { .. }));
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_surfaces_network_failure() {
        let client = offline_client();

        let err = client.fetch_initial_stock().await.unwrap_err();

        // Single attempt policy, so exhaustion wraps the first failure
        assert!(matches!(err, ApiError::Exhausted { attempts: 1, .. }));
        assert!(matches!(
            err.root(),
            ApiError::Network { .. } | ApiError::Timeout { .. }
        ));
        assert!(client.cache().get(&RequestFingerprint::new("/stock", None)).is_none());
        assert_eq!(client.in_flight_count(), 0);
    }

    #[test]
    fn test_new_uses_namespaced_cache_dir() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = ClientConfig::default().with_cache_dir(Some(temp_dir.path().to_path_buf()));

        let client = StockClient::new(&config);

        assert_eq!(client.cache().dir(), config.cache_namespace_dir().as_deref());
        assert_eq!(client.cache().ttl(), chrono::Duration::minutes(5));
    }
}
