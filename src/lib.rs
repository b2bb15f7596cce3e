//! Cachegate
//!
//! A client-resident request-interception cache proxy. Cachegate sits
//! between an application and the network: every outgoing GET-equivalent
//! resource request is classified, routed through a per-class caching
//! strategy against named versioned stores, and answered from cache, from
//! the network, or both.
//!
//! # Overview
//!
//! The proxy runs as an auxiliary execution context started by the hosting
//! runtime. It owns a set of generational cache stores, precaches configured
//! resource sets on install, purges stale-generation stores on activation,
//! prefetches resources predicted by the current navigation, and exposes a
//! message-based control channel for runtime introspection and
//! reconfiguration.
//!
//! # Features
//!
//! - **Per-class strategies**: cache-first, cache-first with enrichment,
//!   cache-first long-term, stale-while-revalidate, network-first with
//!   structured or offline-document fallbacks, and network-only passthrough
//! - **Generational stores**: named stores keyed by a generation tag, purged
//!   automatically when a new generation activates
//! - **Predictive prefetch**: path-based prediction table with a bounded
//!   per-navigation fetch budget
//! - **Graceful degradation**: images fall back to a generated placeholder,
//!   pages to an offline document, API calls to a typed error payload;
//!   nothing crashes the calling page
//! - **Control channel**: typed commands for cache status, clearing,
//!   ad-hoc precaching and prefetcher reconfiguration
//! - **Metrics**: process-wide hit/miss/network/prefetch counters pushed
//!   periodically to connected clients
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cachegate::{CacheProxy, ProxyConfig, ProxyRequest};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from file
//! let config = ProxyConfig::from_file("cachegate.yaml")?;
//! let proxy = CacheProxy::new(Arc::new(config));
//!
//! // Bring the generation up
//! proxy.install().await?;
//! proxy.activate().await?;
//!
//! // Serve an intercepted request
//! let response = proxy.handle_request(ProxyRequest::get("/css/style.css")).await?;
//! println!("status: {}", response.status);
//!
//! // Inspect metrics
//! let snapshot = proxy.metrics().snapshot();
//! println!("hit rate: {:.1}%", snapshot.hit_rate());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`CacheProxy`]: composition root and host event loop
//! - [`Classifier`]: ordered-rule URL classification
//! - [`StrategyEngine`]: per-class cache/network composition policies
//! - [`StoreRegistry`] / [`CacheStore`]: named generational stores
//! - [`LifecycleManager`]: install precache and activation cleanup
//! - [`Prefetcher`]: predictive prefetching
//! - [`ProxyMetrics`]: process-wide counters
//! - [`ControlHandler`]: message-based control channel
//!
//! # Configuration
//!
//! Configuration is loaded from a YAML file:
//!
//! ```yaml
//! cache_namespace: cachegate
//! generation: v3
//! critical_urls:
//!   - /
//!   - /index.html
//!   - /css/style.css
//! important_urls:
//!   - /js/app.js
//! network_timeout_secs: 4
//! prefetch:
//!   enabled: true
//!   capacity: 10
//!   routes:
//!     /: ["/css/style.css", "/js/app.js"]
//! origin: "http://127.0.0.1:8080"
//! ```
//!
//! See [`ProxyConfig`] for all options.

pub mod batch;
pub mod classifier;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod origin;
pub mod prefetch;
pub mod proxy;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub use classifier::Classifier;
pub use config::{PrefetchConfig, ProxyConfig};
pub use control::{ControlHandler, ControlMessage, ControlReply};
pub use error::{ProxyError, Result};
pub use lifecycle::{LifecycleManager, ProxyState};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use models::{ProxyRequest, ProxyResponse, ResourceClass};
pub use origin::OriginClient;
pub use prefetch::{PrefetchOutcome, Prefetcher};
pub use proxy::{CacheProxy, ClientMessage, ProxyEvent};
pub use store::{CacheStore, StoreRegistry};
pub use strategy::{Enrich, StrategyEngine};
