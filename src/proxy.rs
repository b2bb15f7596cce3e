//! Proxy composition and host event dispatch
//!
//! `CacheProxy` wires the classifier, store registry, origin client,
//! strategy engine, lifecycle manager, prefetcher, metrics and control
//! handler together, and runs the event loop that receives typed host
//! signals. Each inbound event is routed to exactly one handler; request
//! handlers are spawned so multiple requests are in flight concurrently,
//! each with its own control flow and no cross-request ordering guarantee.

use crate::classifier::Classifier;
use crate::config::ProxyConfig;
use crate::control::{ControlHandler, ControlMessage, ControlReply};
use crate::error::Result;
use crate::lifecycle::{precache, LifecycleManager, ProxyState};
use crate::metrics::{MetricsSnapshot, ProxyMetrics};
use crate::models::{ProxyRequest, ProxyResponse, ResourceClass};
use crate::origin::OriginClient;
use crate::prefetch::Prefetcher;
use crate::store::StoreRegistry;
use crate::strategy::StrategyEngine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Notification action offered when an update is available
pub const ACTION_UPDATE: &str = "update";
/// Notification action dismissing the update prompt
pub const ACTION_DISMISS: &str = "dismiss";

/// Messages broadcast to connected clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// This generation has taken over; no reload required
    Claimed { generation: String },
    /// An update is available; shown as a notification with two actions
    UpdateAvailable {
        title: String,
        body: String,
        actions: Vec<String>,
    },
    /// The user picked a notification action
    NotificationAction { action: String },
    /// Periodic metrics report
    Metrics { metrics: MetricsSnapshot },
}

/// Typed host signals consumed by the event loop
#[derive(Debug)]
pub enum ProxyEvent {
    /// Install signal: precache the configured resource sets
    Install,
    /// Activate signal: purge stale generations and claim clients
    Activate,
    /// An intercepted request; the response goes back over `reply`
    Fetch {
        request: ProxyRequest,
        reply: oneshot::Sender<Result<ProxyResponse>>,
    },
    /// A control-channel message
    Message {
        message: ControlMessage,
        reply: oneshot::Sender<ControlReply>,
    },
    /// Push-style signal from the host (e.g. update available)
    Push { payload: Value },
    /// Periodic idle signal: refill anything missing from the critical set
    PeriodicSync,
    /// The user acted on a displayed notification
    NotificationAction { action: String },
}

/// The request-interception cache proxy
pub struct CacheProxy {
    config: Arc<ProxyConfig>,
    classifier: Arc<Classifier>,
    registry: Arc<StoreRegistry>,
    origin: Arc<OriginClient>,
    engine: Arc<StrategyEngine>,
    lifecycle: Arc<LifecycleManager>,
    prefetcher: Arc<Prefetcher>,
    metrics: Arc<ProxyMetrics>,
    control: Arc<ControlHandler>,
    clients: broadcast::Sender<ClientMessage>,
}

impl CacheProxy {
    /// Build a proxy from its configuration
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        let classifier = Arc::new(Classifier::new(
            config.critical_urls.clone(),
            config.api_path_marker.clone(),
        ));
        let registry = Arc::new(StoreRegistry::new(
            config.cache_namespace.clone(),
            config.generation.clone(),
        ));
        let origin = Arc::new(OriginClient::new(
            config.origin.clone(),
            Duration::from_secs(config.network_timeout_secs),
        ));
        let metrics = Arc::new(ProxyMetrics::new());
        let engine = Arc::new(StrategyEngine::new(
            Arc::clone(&registry),
            Arc::clone(&origin),
            Arc::clone(&metrics),
        ));
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&registry),
            Arc::clone(&origin),
            Arc::clone(&config),
        ));
        let prefetcher = Arc::new(Prefetcher::new(
            config.prefetch.routes.clone(),
            config.prefetch.enabled,
            config.prefetch.capacity,
            Arc::clone(&registry),
            Arc::clone(&origin),
            Arc::clone(&metrics),
            Arc::clone(&classifier),
        ));
        let control = Arc::new(ControlHandler::new(
            Arc::clone(&registry),
            Arc::clone(&origin),
            Arc::clone(&lifecycle),
            Arc::clone(&prefetcher),
            Arc::clone(&metrics),
        ));
        let (clients, _) = broadcast::channel(64);

        CacheProxy {
            config,
            classifier,
            registry,
            origin,
            engine,
            lifecycle,
            prefetcher,
            metrics,
            control,
            clients,
        }
    }

    /// The interception hook: classify and serve one outgoing request
    ///
    /// Non-GET requests pass through to the network unclassified. After a
    /// page is served, its pathname is handed to the prefetcher in the
    /// background; the response is never delayed by prefetching.
    pub async fn handle_request(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        if !request.is_get_like() {
            return self.engine.dispatch(ResourceClass::Default, &request).await;
        }

        let class = self.classifier.classify(&request.url);
        debug!(url = %request.url, class = %class, "request classified");
        let response = self.engine.dispatch(class, &request).await?;

        if class == ResourceClass::Page {
            let prefetcher = Arc::clone(&self.prefetcher);
            let pathname = request.path().to_string();
            tokio::spawn(async move {
                prefetcher.on_navigation_served(&pathname).await;
            });
        }

        Ok(response)
    }

    /// Run the install step for this generation
    pub async fn install(&self) -> Result<()> {
        self.lifecycle.install().await
    }

    /// Run the activation step and claim connected clients
    pub async fn activate(&self) -> Result<()> {
        self.lifecycle.activate().await?;
        let _ = self.clients.send(ClientMessage::Claimed {
            generation: self.config.generation.clone(),
        });
        Ok(())
    }

    /// Attach a client to the broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
        self.clients.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProxyState {
        self.lifecycle.state()
    }

    /// Metrics collector handle
    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Store registry handle
    pub fn registry(&self) -> Arc<StoreRegistry> {
        Arc::clone(&self.registry)
    }

    /// Surface a push payload as a user notification
    fn handle_push(&self, payload: Value) {
        let msg_type = payload.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if msg_type != "update-available" {
            debug!(push_type = %msg_type, "unrecognized push payload, ignoring");
            return;
        }

        let title = payload
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("Update available")
            .to_string();
        let body = payload
            .get("body")
            .and_then(|v| v.as_str())
            .unwrap_or("A new version is ready.")
            .to_string();

        info!("surfacing update notification");
        let _ = self.clients.send(ClientMessage::UpdateAvailable {
            title,
            body,
            actions: vec![ACTION_UPDATE.to_string(), ACTION_DISMISS.to_string()],
        });
    }

    /// Background-sync pass: refetch critical resources that went missing
    async fn background_sync(&self) {
        let store = self.registry.open("critical").await;
        let mut missing = Vec::new();
        for url in &self.config.critical_urls {
            match store.lookup(url).await {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => missing.push(url.clone()),
            }
        }
        if missing.is_empty() {
            return;
        }

        debug!(count = missing.len(), "background sync refilling critical store");
        let outcome = precache(&self.registry, &self.origin, "critical", &missing).await;
        debug!(
            refilled = outcome.succeeded.len(),
            failed = outcome.failed,
            "background sync complete"
        );
    }

    fn dispatch_event(proxy: Arc<Self>, event: ProxyEvent) {
        tokio::spawn(async move {
            match event {
                ProxyEvent::Install => {
                    if let Err(e) = proxy.install().await {
                        warn!(error = %e, "install failed");
                    }
                }
                ProxyEvent::Activate => {
                    if let Err(e) = proxy.activate().await {
                        warn!(error = %e, "activation failed");
                    }
                }
                ProxyEvent::Fetch { request, reply } => {
                    let response = proxy.handle_request(request).await;
                    let _ = reply.send(response);
                }
                ProxyEvent::Message { message, reply } => {
                    proxy.control.handle(message, reply).await;
                }
                ProxyEvent::Push { payload } => proxy.handle_push(payload),
                ProxyEvent::PeriodicSync => proxy.background_sync().await,
                ProxyEvent::NotificationAction { action } => {
                    let _ = proxy
                        .clients
                        .send(ClientMessage::NotificationAction { action });
                }
            }
        });
    }

    /// Drive the proxy from a stream of host events
    ///
    /// Returns when the event channel closes. Metrics are pushed to
    /// connected clients on the configured interval while the loop runs.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ProxyEvent>) {
        let push_enabled = self.config.metrics_push_interval_secs > 0;
        let period = if push_enabled {
            Duration::from_secs(self.config.metrics_push_interval_secs)
        } else {
            // Effectively never; the branch below is disabled anyway
            Duration::from_secs(86_400)
        };
        let mut ticker = tokio::time::interval(period);
        // The first interval tick completes immediately; skip it
        ticker.tick().await;

        info!(
            generation = %self.config.generation,
            "proxy event loop running"
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => Self::dispatch_event(Arc::clone(&self), event),
                        None => {
                            info!("event channel closed, shutting down");
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if push_enabled => {
                    let _ = self.clients.send(ClientMessage::Metrics {
                        metrics: self.metrics.snapshot(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    fn proxy() -> Arc<CacheProxy> {
        let config = ProxyConfig {
            origin: Some("http://127.0.0.1:9".to_string()),
            network_timeout_secs: 1,
            metrics_push_interval_secs: 0,
            ..Default::default()
        };
        Arc::new(CacheProxy::new(Arc::new(config)))
    }

    #[tokio::test]
    async fn test_api_request_degrades_to_error_payload() {
        let proxy = proxy();
        let response = proxy
            .handle_request(ProxyRequest::get("/api/health"))
            .await
            .unwrap();

        assert_eq!(response.status.as_u16(), 503);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Network unavailable");
        assert_eq!(body["cached"], false);
    }

    #[tokio::test]
    async fn test_non_get_bypasses_classification() {
        let proxy = proxy();
        let result = proxy
            .handle_request(ProxyRequest::with_method(Method::POST, "/api/submit"))
            .await;

        // Network-only passthrough propagates the network failure
        assert!(result.is_err());
        // And never touches a store
        assert!(proxy.registry().list_store_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_activate_claims_clients() {
        let proxy = proxy();
        let mut clients = proxy.subscribe();

        proxy.activate().await.unwrap();

        let message = clients.recv().await.unwrap();
        assert_eq!(
            message,
            ClientMessage::Claimed {
                generation: "v1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_push_surfaces_update_notification() {
        let proxy = proxy();
        let mut clients = proxy.subscribe();

        proxy.handle_push(json!({
            "type": "update-available",
            "title": "New version",
            "body": "Version 2 is ready."
        }));

        match clients.recv().await.unwrap() {
            ClientMessage::UpdateAvailable { title, actions, .. } => {
                assert_eq!(title, "New version");
                assert_eq!(actions, vec!["update", "dismiss"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_push_is_ignored() {
        let proxy = proxy();
        let mut clients = proxy.subscribe();

        proxy.handle_push(json!({"type": "something-else"}));

        assert!(matches!(
            clients.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_event_loop_routes_fetch_and_message() {
        let proxy = proxy();
        let (tx, rx) = mpsc::channel(8);
        let loop_handle = tokio::spawn(Arc::clone(&proxy).run(rx));

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(ProxyEvent::Fetch {
            request: ProxyRequest::get("/api/health"),
            reply: reply_tx,
        })
        .await
        .unwrap();
        let response = reply_rx.await.unwrap().unwrap();
        assert_eq!(response.status.as_u16(), 503);

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(ProxyEvent::Message {
            message: ControlMessage::new("get-cache-status"),
            reply: reply_tx,
        })
        .await
        .unwrap();
        assert!(matches!(
            reply_rx.await.unwrap(),
            ControlReply::CacheStatus { .. }
        ));

        drop(tx);
        loop_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_notification_action_relayed_to_clients() {
        let proxy = proxy();
        let mut clients = proxy.subscribe();
        let (tx, rx) = mpsc::channel(8);
        let loop_handle = tokio::spawn(Arc::clone(&proxy).run(rx));

        tx.send(ProxyEvent::NotificationAction {
            action: ACTION_UPDATE.to_string(),
        })
        .await
        .unwrap();

        let message = clients.recv().await.unwrap();
        assert_eq!(
            message,
            ClientMessage::NotificationAction {
                action: "update".to_string()
            }
        );

        drop(tx);
        loop_handle.await.unwrap();
    }
}
