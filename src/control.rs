//! Control channel
//!
//! Message-based RPC surface the hosting application uses to introspect and
//! reconfigure the proxy at runtime. Each message is a `{type, payload}` pair
//! with a caller-supplied oneshot reply channel; pairing requests with
//! replies is the caller's responsibility. Unknown command types are ignored
//! (the reply channel is dropped, not answered) so older callers can talk to
//! a newer proxy and vice versa.

use crate::lifecycle::{precache, LifecycleManager};
use crate::metrics::{MetricsSnapshot, ProxyMetrics};
use crate::origin::OriginClient;
use crate::prefetch::Prefetcher;
use crate::store::StoreRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A control command sent by the hosting application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Command type, e.g. "clear-cache"
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Command-specific payload; `null` when a command takes none
    #[serde(default)]
    pub payload: Value,
}

impl ControlMessage {
    /// Create a message without a payload
    pub fn new(msg_type: impl Into<String>) -> Self {
        ControlMessage {
            msg_type: msg_type.into(),
            payload: Value::Null,
        }
    }

    /// Create a message with a payload
    pub fn with_payload(msg_type: impl Into<String>, payload: Value) -> Self {
        ControlMessage {
            msg_type: msg_type.into(),
            payload,
        }
    }
}

/// Reply to a control command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlReply {
    /// Generic acknowledgement
    Ack,
    /// Per-store entry counts, keyed by full store name
    CacheStatus { stores: HashMap<String, usize> },
    /// Number of stores deleted by clear-cache
    Cleared { stores: usize },
    /// Precache-urls outcome
    Precached { requested: usize, cached: usize },
    /// Current metrics snapshot
    Metrics { metrics: MetricsSnapshot },
    /// Configure-strategy acknowledgement
    Configured,
}

#[derive(Debug, Deserialize)]
struct PrecachePayload {
    urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigurePayload {
    prefetch_enabled: Option<bool>,
    prefetch_capacity: Option<usize>,
    prefetch_routes: Option<HashMap<String, Vec<String>>>,
}

/// Dispatches control messages to the owning components
pub struct ControlHandler {
    registry: Arc<StoreRegistry>,
    origin: Arc<OriginClient>,
    lifecycle: Arc<LifecycleManager>,
    prefetcher: Arc<Prefetcher>,
    metrics: Arc<ProxyMetrics>,
}

impl ControlHandler {
    pub fn new(
        registry: Arc<StoreRegistry>,
        origin: Arc<OriginClient>,
        lifecycle: Arc<LifecycleManager>,
        prefetcher: Arc<Prefetcher>,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        ControlHandler {
            registry,
            origin,
            lifecycle,
            prefetcher,
            metrics,
        }
    }

    /// Handle one control message, sending the reply over the provided
    /// channel
    ///
    /// Every recognized command is idempotent when repeated. Unknown command
    /// types and malformed payloads are logged and dropped without a reply.
    pub async fn handle(&self, message: ControlMessage, reply: oneshot::Sender<ControlReply>) {
        debug!(command = %message.msg_type, "control message received");

        let response = match message.msg_type.as_str() {
            "skip-waiting" => {
                if let Err(e) = self.lifecycle.skip_waiting().await {
                    warn!(error = %e, "skip-waiting activation failed");
                }
                ControlReply::Ack
            }
            "get-cache-status" => ControlReply::CacheStatus {
                stores: self.registry.status().await,
            },
            "get-metrics" => ControlReply::Metrics {
                metrics: self.metrics.snapshot(),
            },
            "clear-cache" => {
                let stores = self.registry.delete_all().await.unwrap_or(0);
                ControlReply::Cleared { stores }
            }
            "precache-urls" => {
                let payload: PrecachePayload = match serde_json::from_value(message.payload) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "malformed precache-urls payload, ignoring");
                        return;
                    }
                };
                let requested = payload.urls.len();
                let outcome =
                    precache(&self.registry, &self.origin, "custom", &payload.urls).await;
                ControlReply::Precached {
                    requested,
                    cached: outcome.succeeded.len(),
                }
            }
            "configure-strategy" => {
                let payload: ConfigurePayload = match serde_json::from_value(message.payload) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "malformed configure-strategy payload, ignoring");
                        return;
                    }
                };
                if let Some(enabled) = payload.prefetch_enabled {
                    self.prefetcher.set_enabled(enabled);
                }
                if let Some(capacity) = payload.prefetch_capacity {
                    self.prefetcher.set_capacity(capacity);
                }
                if let Some(routes) = payload.prefetch_routes {
                    self.prefetcher.set_routes(routes).await;
                }
                ControlReply::Configured
            }
            other => {
                // Deliberately loose: a caller speaking a newer protocol
                // version must not break this proxy.
                debug!(command = %other, "unknown control command, ignoring");
                return;
            }
        };

        // The caller may have stopped waiting; that is not our problem.
        let _ = reply.send(response);
    }
}
