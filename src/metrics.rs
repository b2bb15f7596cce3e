//! Metrics collection for the proxy
//!
//! Process-wide counters incremented by the strategy engine after each
//! completed operation, plus last-operation bookkeeping. Counters are
//! monotonic and reset only when the proxy process restarts; nothing is
//! persisted.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Thread-safe metrics collector
#[derive(Debug)]
pub struct ProxyMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_requests: AtomicU64,
    predictive_fetches: AtomicU64,

    start_time: Instant,

    // Last-operation bookkeeping
    last_strategy: RwLock<Option<String>>,
    last_status: AtomicU64,
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_requests: u64,
    pub predictive_fetches: u64,
    pub uptime_secs: u64,
    pub last_strategy: Option<String>,
    pub last_status: Option<u16>,
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyMetrics {
    /// Create a new metrics collector; the uptime clock starts now
    pub fn new() -> Self {
        ProxyMetrics {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            network_requests: AtomicU64::new(0),
            predictive_fetches: AtomicU64::new(0),
            start_time: Instant::now(),
            last_strategy: RwLock::new(None),
            last_status: AtomicU64::new(0),
        }
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a network fetch
    pub fn record_network(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a predictive prefetch
    pub fn record_prefetch(&self) {
        self.predictive_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the strategy and status of the operation that just completed
    pub fn record_operation(&self, strategy: &str, status: u16) {
        if let Ok(mut last) = self.last_strategy.write() {
            *last = Some(strategy.to_string());
        }
        self.last_status.store(status as u64, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot of all metrics
    ///
    /// The snapshot may not be perfectly consistent across fields while
    /// operations are in flight.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let last_status = self.last_status.load(Ordering::Relaxed);
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            predictive_fetches: self.predictive_fetches.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs(),
            last_strategy: self
                .last_strategy
                .read()
                .ok()
                .and_then(|guard| guard.clone()),
            last_status: if last_status == 0 {
                None
            } else {
                Some(last_status as u16)
            },
        }
    }

    /// Reset all counters to zero (restart semantics)
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.network_requests.store(0, Ordering::Relaxed);
        self.predictive_fetches.store(0, Ordering::Relaxed);
        self.last_status.store(0, Ordering::Relaxed);
        if let Ok(mut last) = self.last_strategy.write() {
            *last = None;
        }
    }
}

impl MetricsSnapshot {
    /// Cache hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }
}
