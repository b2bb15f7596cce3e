//! Proxy generation lifecycle
//!
//! A proxy generation moves through `Installing -> Installed -> Activating ->
//! Active`. Install precaches the critical and important resource sets with
//! partial-failure tolerance; activation purges every store left behind by a
//! previous generation and hands active clients over to the new one.

use crate::batch::{best_effort, BatchOutcome};
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::origin::OriginClient;
use crate::store::StoreRegistry;
use std::sync::Arc;
use std::sync::RwLock;
use tracing::{debug, info};

/// Lifecycle states of a proxy generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Installing,
    Installed,
    Activating,
    Active,
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProxyState::Installing => "installing",
            ProxyState::Installed => "installed",
            ProxyState::Activating => "activating",
            ProxyState::Active => "active",
        };
        f.write_str(label)
    }
}

/// Fetch-and-store a list of URLs into a named store, best-effort
///
/// Each resource is fetched and stored independently; a failure on one never
/// fails the others. Returns the URLs that ended up cached. Shared by
/// install, the precache-urls control command and the background sync pass.
pub async fn precache(
    registry: &Arc<StoreRegistry>,
    origin: &Arc<OriginClient>,
    store_name: &str,
    urls: &[String],
) -> BatchOutcome<String> {
    let store = registry.open(store_name).await;
    let tasks: Vec<_> = urls
        .iter()
        .map(|url| {
            let origin = Arc::clone(origin);
            let store = Arc::clone(&store);
            let url = url.clone();
            async move {
                let response = origin.fetch(&url).await?;
                store.put(&url, response).await?;
                Ok(url)
            }
        })
        .collect();

    best_effort(&format!("precache:{}", store_name), tasks).await
}

/// Drives install and activation for one proxy generation
pub struct LifecycleManager {
    state: RwLock<ProxyState>,
    registry: Arc<StoreRegistry>,
    origin: Arc<OriginClient>,
    config: Arc<ProxyConfig>,
}

impl LifecycleManager {
    /// Create a manager in the `Installing` state
    pub fn new(
        registry: Arc<StoreRegistry>,
        origin: Arc<OriginClient>,
        config: Arc<ProxyConfig>,
    ) -> Self {
        LifecycleManager {
            state: RwLock::new(ProxyState::Installing),
            registry,
            origin,
            config,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ProxyState {
        self.state
            .read()
            .map(|s| *s)
            .unwrap_or(ProxyState::Installing)
    }

    fn set_state(&self, next: ProxyState) {
        if let Ok(mut state) = self.state.write() {
            debug!(from = %state, to = %next, "lifecycle transition");
            *state = next;
        }
    }

    /// Install this generation: precache the critical and important sets
    ///
    /// The two sets are precached concurrently; only resources that fetch
    /// successfully end up cached, and install completes regardless of how
    /// many failed.
    pub async fn install(&self) -> Result<()> {
        self.set_state(ProxyState::Installing);
        info!(
            generation = %self.registry.generation(),
            critical = self.config.critical_urls.len(),
            important = self.config.important_urls.len(),
            "installing"
        );

        let critical = precache(
            &self.registry,
            &self.origin,
            "critical",
            &self.config.critical_urls,
        );
        let important = precache(
            &self.registry,
            &self.origin,
            "static",
            &self.config.important_urls,
        );
        let (critical, important) = tokio::join!(critical, important);

        info!(
            critical_cached = critical.succeeded.len(),
            critical_failed = critical.failed,
            important_cached = important.succeeded.len(),
            important_failed = important.failed,
            "install complete"
        );

        self.set_state(ProxyState::Installed);
        Ok(())
    }

    /// Activate this generation: purge stale-generation stores
    ///
    /// Deletes every store whose name carries this proxy's namespace but a
    /// generation tag other than the current one. Re-activation with the
    /// same generation is a no-op. Returns the deleted store names; the
    /// caller claims connected clients once this completes.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.set_state(ProxyState::Activating);

        let names = self.registry.list_store_names().await;
        let mut deleted = Vec::new();
        for full_name in names {
            let stale = match self.registry.split_full_name(&full_name) {
                Some((_, generation)) => generation != self.registry.generation(),
                // Not under our namespace: leave it alone
                None => false,
            };
            if stale && self.registry.delete_store(&full_name).await? {
                deleted.push(full_name);
            }
        }

        info!(
            generation = %self.registry.generation(),
            purged = deleted.len(),
            "activated"
        );
        self.set_state(ProxyState::Active);
        Ok(deleted)
    }

    /// Activate immediately, skipping the waiting phase
    ///
    /// Used by the activate-now control command; safe to repeat.
    pub async fn skip_waiting(&self) -> Result<Vec<String>> {
        debug!("skip-waiting requested");
        self.activate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxyResponse;
    use std::time::Duration;

    fn manager_with(config: ProxyConfig) -> (LifecycleManager, Arc<StoreRegistry>) {
        let registry = Arc::new(StoreRegistry::new(
            config.cache_namespace.clone(),
            config.generation.clone(),
        ));
        let origin = Arc::new(OriginClient::new(
            Some("http://127.0.0.1:9".to_string()),
            Duration::from_secs(1),
        ));
        let manager = LifecycleManager::new(Arc::clone(&registry), origin, Arc::new(config));
        (manager, registry)
    }

    #[tokio::test]
    async fn test_install_completes_with_dead_origin() {
        let config = ProxyConfig {
            critical_urls: vec!["/".to_string(), "/index.html".to_string()],
            important_urls: vec!["/js/app.js".to_string()],
            ..Default::default()
        };
        let (manager, registry) = manager_with(config);

        manager.install().await.unwrap();

        assert_eq!(manager.state(), ProxyState::Installed);
        // Nothing was reachable, so nothing got cached; install still completed
        assert_eq!(registry.open("critical").await.len().await, 0);
        assert_eq!(registry.open("static").await.len().await, 0);
    }

    #[tokio::test]
    async fn test_activate_purges_stale_generations() {
        let (manager, registry) = manager_with(ProxyConfig {
            generation: "v2".to_string(),
            ..Default::default()
        });

        let stale = registry.open_with_generation("images", "v1").await;
        stale.put("/a.png", ProxyResponse::ok("old")).await.unwrap();
        let current = registry.open("images").await;
        current.put("/a.png", ProxyResponse::ok("new")).await.unwrap();

        let deleted = manager.activate().await.unwrap();

        assert_eq!(deleted, vec!["cachegate-images-v1".to_string()]);
        assert_eq!(manager.state(), ProxyState::Active);
        let names = registry.list_store_names().await;
        assert_eq!(names, vec!["cachegate-images-v2"]);
    }

    #[tokio::test]
    async fn test_reactivation_is_idempotent() {
        let (manager, registry) = manager_with(ProxyConfig::default());
        registry.open("critical").await;

        let first = manager.activate().await.unwrap();
        assert!(first.is_empty());

        let second = manager.activate().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(registry.list_store_names().await.len(), 1);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates() {
        let (manager, _registry) = manager_with(ProxyConfig::default());
        assert_eq!(manager.state(), ProxyState::Installing);

        manager.skip_waiting().await.unwrap();
        assert_eq!(manager.state(), ProxyState::Active);
    }
}
