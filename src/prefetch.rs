//! Predictive prefetching
//!
//! After a navigation is served, the prefetcher consults a path ->
//! predicted-resources table and warms the stores for resources the page is
//! likely to request next. Prefetching is best-effort throughout: every
//! failure is discarded silently and the originating response is never
//! affected.
//!
//! The table is seeded from configuration and can be replaced at runtime
//! through the configure-strategy control command.

use crate::batch::best_effort;
use crate::classifier::Classifier;
use crate::metrics::ProxyMetrics;
use crate::origin::OriginClient;
use crate::store::StoreRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Outcome of one prefetch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchOutcome {
    /// Predictions considered after the capacity cap
    pub considered: usize,
    /// Background fetches actually issued (not already cached)
    pub launched: usize,
    /// Resources fetched and stored successfully
    pub fetched: usize,
}

impl PrefetchOutcome {
    fn empty() -> Self {
        PrefetchOutcome {
            considered: 0,
            launched: 0,
            fetched: 0,
        }
    }
}

/// Predictive prefetcher over a static navigation-pattern table
pub struct Prefetcher {
    routes: RwLock<HashMap<String, Vec<String>>>,
    enabled: AtomicBool,
    capacity: AtomicUsize,
    registry: Arc<StoreRegistry>,
    origin: Arc<OriginClient>,
    metrics: Arc<ProxyMetrics>,
    classifier: Arc<Classifier>,
}

impl Prefetcher {
    /// Create a prefetcher seeded with the given pattern table
    pub fn new(
        routes: HashMap<String, Vec<String>>,
        enabled: bool,
        capacity: usize,
        registry: Arc<StoreRegistry>,
        origin: Arc<OriginClient>,
        metrics: Arc<ProxyMetrics>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Prefetcher {
            routes: RwLock::new(routes),
            enabled: AtomicBool::new(enabled),
            capacity: AtomicUsize::new(capacity),
            registry,
            origin,
            metrics,
            classifier,
        }
    }

    /// Whether prefetching is currently enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable prefetching at runtime
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Maximum prefetches per navigation
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Update the per-navigation cap at runtime
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    /// Replace the entire pattern table
    pub async fn set_routes(&self, routes: HashMap<String, Vec<String>>) {
        *self.routes.write().await = routes;
    }

    /// Add or replace the predictions for a single path
    pub async fn add_route(&self, pathname: String, predicted: Vec<String>) {
        self.routes.write().await.insert(pathname, predicted);
    }

    /// Run a prefetch pass for a just-served navigation
    ///
    /// Looks up the pathname in the pattern table; for each predicted URL
    /// (capped at the configured capacity) that is not already cached in its
    /// class store, issues a background fetch and stores the result. Fetch
    /// failures are discarded.
    pub async fn on_navigation_served(&self, pathname: &str) -> PrefetchOutcome {
        if !self.is_enabled() {
            return PrefetchOutcome::empty();
        }

        let predicted: Vec<String> = {
            let routes = self.routes.read().await;
            match routes.get(pathname) {
                Some(urls) => urls.iter().take(self.capacity()).cloned().collect(),
                None => return PrefetchOutcome::empty(),
            }
        };
        let considered = predicted.len();

        // Filter out resources that are already cached or uncacheable
        let mut candidates = Vec::new();
        for url in predicted {
            let class = self.classifier.classify(&url);
            let store_name = match self.classifier.store_name_for(class) {
                Some(name) => name,
                None => {
                    debug!(url = %url, "prediction is network-only, skipping");
                    continue;
                }
            };
            let store = self.registry.open(store_name).await;
            match store.lookup(&url).await {
                Ok(Some(_)) => {
                    debug!(url = %url, "prediction already cached, skipping");
                }
                Ok(None) | Err(_) => candidates.push((url, store)),
            }
        }
        let launched = candidates.len();

        let tasks: Vec<_> = candidates
            .into_iter()
            .map(|(url, store)| {
                let origin = Arc::clone(&self.origin);
                let metrics = Arc::clone(&self.metrics);
                async move {
                    let response = origin.fetch(&url).await?;
                    store.put(&url, response).await?;
                    metrics.record_prefetch();
                    Ok(url)
                }
            })
            .collect();

        let outcome = best_effort("prefetch", tasks).await;
        debug!(
            pathname = %pathname,
            considered,
            launched,
            fetched = outcome.succeeded.len(),
            "prefetch pass complete"
        );

        PrefetchOutcome {
            considered,
            launched,
            fetched: outcome.succeeded.len(),
        }
    }
}
