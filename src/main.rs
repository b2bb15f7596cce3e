//! Cachegate proxy runner
//!
//! Entry point for running the proxy standalone. It loads configuration,
//! sets up logging, brings a generation up (install + activate) and drives
//! the host event loop until the event channel closes.

use anyhow::Context;
use cachegate::{CacheProxy, ProxyConfig, ProxyEvent};
use std::env;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    info!("Starting cachegate proxy");

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "cachegate.yaml".to_string());
    info!("Loading configuration from: {}", config_path);

    let config = ProxyConfig::from_file(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    info!("  - Namespace: {}", config.cache_namespace);
    info!("  - Generation: {}", config.generation);
    info!("  - Critical resources: {}", config.critical_urls.len());
    info!("  - Important resources: {}", config.important_urls.len());
    info!("  - Network timeout: {}s", config.network_timeout_secs);
    info!(
        "  - Prefetch: enabled={} capacity={}",
        config.prefetch.enabled, config.prefetch.capacity
    );

    let proxy = Arc::new(CacheProxy::new(Arc::new(config)));

    // Bring this generation up before serving
    proxy.install().await.context("install failed")?;
    proxy.activate().await.context("activation failed")?;
    info!("Proxy state: {}", proxy.state());

    let snapshot = proxy.metrics().snapshot();
    info!(
        "Precache complete: {} network fetches so far",
        snapshot.network_requests
    );

    // Drive the event loop; the host feeds events through this channel.
    let (events_tx, events_rx) = mpsc::channel::<ProxyEvent>(256);
    info!("Event loop running; close the channel to shut down");

    // Keep a sender alive for embedders that attach later; dropping it ends
    // the loop.
    let _host_handle = events_tx;
    Arc::clone(&proxy).run(events_rx).await;

    info!("Proxy shut down");
    Ok(())
}
