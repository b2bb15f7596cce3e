//! Network client for origin fetches

use crate::error::{ProxyError, Result};
use crate::models::ProxyResponse;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// HTTP client for fetching resources from the origin
pub struct OriginClient {
    http_client: Client,
    base: Option<String>,
    timeout: Duration,
}

impl OriginClient {
    /// Create a new OriginClient
    ///
    /// # Arguments
    /// * `base` - Optional base URL prepended to relative resource paths
    /// * `timeout` - Bound applied by `fetch_with_timeout`
    pub fn new(base: Option<String>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .expect("Failed to create HTTP client");

        OriginClient {
            http_client,
            base,
            timeout,
        }
    }

    /// Resolve a possibly-relative URL against the configured origin base
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base {
            Some(base) => {
                let base = base.trim_end_matches('/');
                if url.starts_with('/') {
                    format!("{}{}", base, url)
                } else {
                    format!("{}/{}", base, url)
                }
            }
            None => url.to_string(),
        }
    }

    /// Fetch a resource from the origin
    ///
    /// # Returns
    /// * `Ok(ProxyResponse)` for a 2xx origin response
    /// * `Err(ProxyError::HttpStatus)` for a non-success status
    /// * `Err(ProxyError::NetworkError)` for connection-level failures
    pub async fn fetch(&self, url: &str) -> Result<ProxyResponse> {
        let resolved = self.resolve(url);
        debug!(url = %resolved, "fetching from origin");

        let response = self
            .http_client
            .get(&resolved)
            .send()
            .await
            .map_err(|e| ProxyError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let headers = response.headers().clone();

        if !status.is_success() {
            return Err(ProxyError::from_status(status.as_u16(), resolved));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::NetworkError(format!("Failed to read response body: {}", e)))?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    /// Forward a request to the origin unmodified (network-only passthrough)
    ///
    /// Used for unclassified resources; method and headers are preserved.
    pub async fn forward(
        &self,
        method: http::Method,
        url: &str,
        headers: &http::HeaderMap,
    ) -> Result<ProxyResponse> {
        let resolved = self.resolve(url);
        debug!(method = %method, url = %resolved, "forwarding to origin");

        let response = self
            .http_client
            .request(method, &resolved)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| ProxyError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::NetworkError(format!("Failed to read response body: {}", e)))?;

        // Passthrough returns whatever the origin said, success or not
        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    /// Fetch under the configured timeout bound
    ///
    /// Elapsing the bound drops the in-flight request (which aborts the
    /// connection) and is treated identically to a network error. The
    /// caller's fallback path always still runs.
    pub async fn fetch_with_timeout(&self, url: &str) -> Result<ProxyResponse> {
        match tokio::time::timeout(self.timeout, self.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout(format!(
                "{}s elapsed for {}",
                self.timeout.as_secs(),
                url
            ))),
        }
    }
}
