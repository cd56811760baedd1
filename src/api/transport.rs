//! Single HTTP round trip to the analysis service under a deadline

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;
use crate::data::ApiResponse;

/// FastAPI error body, e.g. `{"detail": "Analysis not found"}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Value,
}

/// Issues one request per `call`, nothing more
///
/// No retries and no caching happen here; the per-call timeout is the only
/// policy this layer applies.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl Transport {
    /// Creates a transport for `base_url` with the given per-call timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    /// Creates a transport around an existing HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    /// Base URL every path is joined to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-call deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Performs `method path` with an optional JSON body
    ///
    /// # Returns
    /// * `Ok(ApiResponse)` - 2xx response with a valid envelope
    /// * `Err(ApiError::Timeout)` - deadline elapsed before the full body arrived
    /// * `Err(ApiError::Status)` - non-2xx response
    /// * `Err(ApiError::Network)` - connection failure
    /// * `Err(ApiError::Decode)` - 2xx response that is not an envelope
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "sending request");

        let exchange = async {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .headers(Self::default_headers());
            if let Some(body) = body {
                request = request.body(body.to_string());
            }

            let response = request.send().await.map_err(network_error)?;
            let status = response.status();
            let text = response.text().await.map_err(network_error)?;
            Ok::<_, ApiError>((status, text))
        };

        // The deadline covers headers and body; on expiry the in-progress
        // request is dropped and nothing partial is returned.
        let (status, text) = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::debug!(%url, timeout_ms = self.timeout.as_millis() as u64, "request timed out");
                return Err(ApiError::Timeout {
                    after: self.timeout,
                });
            }
        };

        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "non-success response");
            return Err(status_error(status.as_u16(), &text));
        }

        serde_json::from_str::<ApiResponse>(&text).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }
}

/// Maps a reqwest failure onto the network variant
fn network_error(err: reqwest::Error) -> ApiError {
    ApiError::Network {
        message: err.to_string(),
    }
}

/// Builds a status error, appending the service's `detail` when present
fn status_error(status: u16, body: &str) -> ApiError {
    let base = ApiError::status(status);
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| match b.detail {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .filter(|d| !d.is_empty());

    match (base, detail) {
        (ApiError::Status { status, message }, Some(detail)) => ApiError::Status {
            status,
            message: format!("{} ({})", message, detail),
        },
        (base, _) => base,
    }
}
