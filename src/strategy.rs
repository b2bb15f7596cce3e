//! Per-class cache/network composition strategies
//!
//! One handler per resource class. Handlers convert every cache or network
//! failure into a response locally; only the network-only passthrough lets a
//! network failure propagate to the caller. Store faults are logged and
//! treated as a miss or no-op, never surfaced.
//!
//! Check-then-write sequences against a store are not transactional: two
//! concurrent first-time requests for the same resource may both miss, both
//! fetch and both write, resolving last-write-wins.

use crate::error::{ProxyError, Result};
use crate::metrics::ProxyMetrics;
use crate::models::{ProxyRequest, ProxyResponse, ResourceClass};
use crate::origin::OriginClient;
use crate::store::{CacheStore, StoreRegistry};
use async_trait::async_trait;
use http::header::{HeaderValue, CACHE_CONTROL};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Enrichment seam applied to image responses before they are stored
///
/// The default implementation only tags the stored copy; a real deployment
/// can plug in recompression here. Enrichment errors are non-fatal: the raw
/// response is stored instead.
#[async_trait]
pub trait Enrich: Send + Sync {
    async fn enrich(&self, response: ProxyResponse) -> Result<ProxyResponse>;
}

/// Default enrichment: marks the stored copy as processed
pub struct TagEnrichment;

#[async_trait]
impl Enrich for TagEnrichment {
    async fn enrich(&self, mut response: ProxyResponse) -> Result<ProxyResponse> {
        response
            .headers
            .insert("x-cachegate-enriched", HeaderValue::from_static("1"));
        Ok(response)
    }
}

/// Strategy engine: routes classified requests through their cache/network
/// composition policy
pub struct StrategyEngine {
    registry: Arc<StoreRegistry>,
    origin: Arc<OriginClient>,
    metrics: Arc<ProxyMetrics>,
    enrichment: Arc<dyn Enrich>,
}

impl StrategyEngine {
    /// Create a new engine over the given stores, origin client and metrics
    pub fn new(
        registry: Arc<StoreRegistry>,
        origin: Arc<OriginClient>,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        StrategyEngine {
            registry,
            origin,
            metrics,
            enrichment: Arc::new(TagEnrichment),
        }
    }

    /// Replace the image enrichment step
    pub fn with_enrichment(mut self, enrichment: Arc<dyn Enrich>) -> Self {
        self.enrichment = enrichment;
        self
    }

    /// Route a classified request to its strategy handler
    ///
    /// Records the strategy label and final status after completion. Only
    /// `ResourceClass::Default` (network-only) can return an error.
    pub async fn dispatch(
        &self,
        class: ResourceClass,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse> {
        let result = match class {
            ResourceClass::Critical => Ok(self.cache_first(request).await),
            ResourceClass::Image => Ok(self.cache_first_image(request).await),
            ResourceClass::Font => Ok(self.cache_first_font(request).await),
            ResourceClass::Api => Ok(self.network_first(request).await),
            ResourceClass::Asset => Ok(self.stale_while_revalidate(request).await),
            ResourceClass::Page => Ok(self.network_first_page(request).await),
            ResourceClass::Default => self.network_only(request).await,
        };

        match &result {
            Ok(response) => self
                .metrics
                .record_operation(class.as_str(), response.status.as_u16()),
            Err(e) => self.metrics.record_operation(class.as_str(), e.to_http_status()),
        }

        result
    }

    /// Cached lookup that treats store faults as a miss
    async fn lookup_or_miss(&self, store: &CacheStore, url: &str) -> Option<ProxyResponse> {
        match store.lookup(url).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %url, error = %e, "store read failed, treating as miss");
                None
            }
        }
    }

    /// Store write that swallows faults
    async fn put_best_effort(&self, store: &CacheStore, url: &str, response: ProxyResponse) {
        if let Err(e) = store.put(url, response).await {
            warn!(url = %url, error = %e, "store write failed");
        }
    }

    /// Convert a network fault into a well-formed failure response
    fn error_response(error: &ProxyError) -> ProxyResponse {
        let status =
            StatusCode::from_u16(error.to_http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
        ProxyResponse::with_status(status, error.to_string())
    }

    /// Cache-first (critical resources)
    ///
    /// Terminal fallback: bare 503.
    async fn cache_first(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("critical").await;

        if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
            self.metrics.record_hit();
            return cached;
        }
        self.metrics.record_miss();
        self.metrics.record_network();

        match self.origin.fetch(&request.url).await {
            Ok(response) => {
                self.put_best_effort(&store, &request.url, response.clone()).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "critical fetch failed");
                ProxyResponse::service_unavailable()
            }
        }
    }

    /// Cache-first with enrichment (images)
    ///
    /// The stored copy goes through the enrichment seam; the caller gets the
    /// raw network response. Terminal fallback: generated placeholder image.
    async fn cache_first_image(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("images").await;

        if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
            self.metrics.record_hit();
            return cached;
        }
        self.metrics.record_miss();
        self.metrics.record_network();

        match self.origin.fetch(&request.url).await {
            Ok(response) => {
                let stored = match self.enrichment.enrich(response.clone()).await {
                    Ok(enriched) => enriched,
                    Err(e) => {
                        warn!(url = %request.url, error = %e, "enrichment failed, storing raw response");
                        response.clone()
                    }
                };
                self.put_best_effort(&store, &request.url, stored).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "image fetch failed, serving placeholder");
                ProxyResponse::placeholder_image()
            }
        }
    }

    /// Cache-first long-term (fonts)
    ///
    /// The stored copy carries an extended-freshness marker; fonts
    /// effectively never go stale within a generation.
    async fn cache_first_font(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("fonts").await;

        if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
            self.metrics.record_hit();
            return cached;
        }
        self.metrics.record_miss();
        self.metrics.record_network();

        match self.origin.fetch(&request.url).await {
            Ok(response) => {
                let mut stored = response.clone();
                stored.headers.insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=31536000, immutable"),
                );
                self.put_best_effort(&store, &request.url, stored).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "font fetch failed");
                ProxyResponse::service_unavailable()
            }
        }
    }

    /// Stale-while-revalidate (scripts and styles)
    ///
    /// A cached entry is returned immediately while a background fetch
    /// refreshes the store; background failures are swallowed. Always
    /// resolves to a response.
    async fn stale_while_revalidate(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("static").await;

        if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
            self.metrics.record_hit();
            self.metrics.record_network();

            let origin = Arc::clone(&self.origin);
            let url = request.url.clone();
            tokio::spawn(async move {
                match origin.fetch(&url).await {
                    Ok(fresh) => {
                        if let Err(e) = store.put(&url, fresh).await {
                            warn!(url = %url, error = %e, "revalidation store write failed");
                        }
                    }
                    Err(e) => {
                        debug!(url = %url, error = %e, "background revalidation failed");
                    }
                }
            });

            return cached;
        }

        self.metrics.record_miss();
        self.metrics.record_network();
        match self.origin.fetch(&request.url).await {
            Ok(response) => {
                self.put_best_effort(&store, &request.url, response.clone()).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "asset fetch failed with no cached copy");
                Self::error_response(&e)
            }
        }
    }

    /// Network-first (API requests)
    ///
    /// The fetch runs under the configured timeout; on failure the cached
    /// entry is served if present, otherwise a structured error payload.
    async fn network_first(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("api").await;

        self.metrics.record_network();
        match self.origin.fetch_with_timeout(&request.url).await {
            Ok(response) => {
                self.put_best_effort(&store, &request.url, response.clone()).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "api fetch failed, trying cache");
                if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
                    self.metrics.record_hit();
                    return cached;
                }
                self.metrics.record_miss();
                ProxyResponse::json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({"error": "Network unavailable", "cached": false}),
                )
            }
        }
    }

    /// Network-first with offline fallback (pages)
    ///
    /// Same shape as the API strategy; the terminal fallback is the offline
    /// document instead of a JSON payload.
    async fn network_first_page(&self, request: &ProxyRequest) -> ProxyResponse {
        let store = self.registry.open("general").await;

        self.metrics.record_network();
        match self.origin.fetch_with_timeout(&request.url).await {
            Ok(response) => {
                self.put_best_effort(&store, &request.url, response.clone()).await;
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "page fetch failed, trying cache");
                if let Some(cached) = self.lookup_or_miss(&store, &request.url).await {
                    self.metrics.record_hit();
                    return cached;
                }
                self.metrics.record_miss();
                ProxyResponse::offline_document()
            }
        }
    }

    /// Network-only passthrough (unclassified resources and non-GET)
    ///
    /// No store interaction; network failure propagates as-is.
    async fn network_only(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        self.metrics.record_network();
        self.origin
            .forward(request.method.clone(), &request.url, &request.headers)
            .await
    }
}
