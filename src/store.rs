//! Named, versioned cache stores and their registry
//!
//! Stores model the host's asynchronous cache storage API: open-by-name with
//! auto-create, key-by-request match, put, delete-by-key, delete-entire-store
//! and list-store-names. A store's identity is its `(name, generation)` pair;
//! full store names follow `{namespace}-{name}-{generation}` so activation
//! can purge every store left over from a previous generation.
//!
//! Individual operations are atomic, but composite check-then-write sequences
//! in the strategies are not transactional: two concurrent writers to the
//! same key resolve to whichever write lands last.

use crate::error::Result;
use crate::models::ProxyResponse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::debug;

/// A single cached response
#[derive(Clone)]
struct StoredEntry {
    response: ProxyResponse,
    stored_at: SystemTime,
}

/// One named, versioned cache store
pub struct CacheStore {
    namespace: String,
    name: String,
    generation: String,
    entries: RwLock<HashMap<String, StoredEntry>>,
}

/// Normalize a URL into a cache key (fragments never reach the network)
fn cache_key(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}

impl CacheStore {
    fn new(namespace: &str, name: &str, generation: &str) -> Self {
        CacheStore {
            namespace: namespace.to_string(),
            name: name.to_string(),
            generation: generation.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Short name of this store (e.g. "images")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generation tag this store belongs to
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Full store name: `{namespace}-{name}-{generation}`
    pub fn full_name(&self) -> String {
        format!("{}-{}-{}", self.namespace, self.name, self.generation)
    }

    /// Look up a cached response by request URL
    pub async fn lookup(&self, url: &str) -> Result<Option<ProxyResponse>> {
        let key = cache_key(url);
        let entries = self.entries.read().await;
        Ok(entries.get(&key).map(|e| e.response.clone()))
    }

    /// Store a response under the request URL, replacing any previous entry
    pub async fn put(&self, url: &str, response: ProxyResponse) -> Result<()> {
        let key = cache_key(url);
        let mut entries = self.entries.write().await;
        debug!(store = %self.full_name(), url = %key, "storing entry");
        entries.insert(
            key,
            StoredEntry {
                response,
                stored_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    /// Delete a single entry; returns whether it existed
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let key = cache_key(url);
        let mut entries = self.entries.write().await;
        Ok(entries.remove(&key).is_some())
    }

    /// Remove every entry; returns the number removed
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    /// Number of entries currently stored
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Age of a stored entry, if present
    pub async fn entry_age(&self, url: &str) -> Option<std::time::Duration> {
        let key = cache_key(url);
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .and_then(|e| e.stored_at.elapsed().ok())
    }
}

/// Registry of named stores for one proxy generation
///
/// Stores are created lazily on first open and are the unit of deletion
/// during generational cleanup.
pub struct StoreRegistry {
    namespace: String,
    generation: String,
    stores: RwLock<HashMap<String, Arc<CacheStore>>>,
}

impl StoreRegistry {
    /// Create a registry for the given namespace and generation
    pub fn new(namespace: impl Into<String>, generation: impl Into<String>) -> Self {
        StoreRegistry {
            namespace: namespace.into(),
            generation: generation.into(),
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Namespace prefix owned by this proxy
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Generation tag of the current deployment
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Open a store by short name in the current generation, creating it on
    /// first use
    pub async fn open(&self, name: &str) -> Arc<CacheStore> {
        self.open_with_generation(name, &self.generation).await
    }

    /// Open a store under an explicit generation tag
    ///
    /// Used when inspecting stores left behind by a previous deployment.
    pub async fn open_with_generation(&self, name: &str, generation: &str) -> Arc<CacheStore> {
        let full = format!("{}-{}-{}", self.namespace, name, generation);
        {
            let stores = self.stores.read().await;
            if let Some(store) = stores.get(&full) {
                return Arc::clone(store);
            }
        }
        let mut stores = self.stores.write().await;
        // A concurrent open may have won the race between locks
        Arc::clone(
            stores
                .entry(full)
                .or_insert_with(|| Arc::new(CacheStore::new(&self.namespace, name, generation))),
        )
    }

    /// Full names of every live store
    pub async fn list_store_names(&self) -> Vec<String> {
        let stores = self.stores.read().await;
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }

    /// Delete an entire store by full name; returns whether it existed
    pub async fn delete_store(&self, full_name: &str) -> Result<bool> {
        let mut stores = self.stores.write().await;
        let removed = stores.remove(full_name).is_some();
        if removed {
            debug!(store = %full_name, "deleted store");
        }
        Ok(removed)
    }

    /// Delete every store unconditionally; returns the number deleted
    pub async fn delete_all(&self) -> Result<usize> {
        let mut stores = self.stores.write().await;
        let count = stores.len();
        stores.clear();
        Ok(count)
    }

    /// Per-store entry counts, keyed by full store name
    pub async fn status(&self) -> HashMap<String, usize> {
        let stores: Vec<Arc<CacheStore>> = {
            let guard = self.stores.read().await;
            guard.values().cloned().collect()
        };
        let mut counts = HashMap::new();
        for store in stores {
            counts.insert(store.full_name(), store.len().await);
        }
        counts
    }

    /// Search every store of the current generation for a cached response
    pub async fn match_any(&self, url: &str) -> Result<Option<ProxyResponse>> {
        let stores: Vec<Arc<CacheStore>> = {
            let guard = self.stores.read().await;
            guard.values().cloned().collect()
        };
        for store in stores {
            if store.generation() != self.generation {
                continue;
            }
            if let Some(response) = store.lookup(url).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    /// Split a full store name into (short name, generation), if it belongs
    /// to this registry's namespace
    pub fn split_full_name<'a>(&self, full_name: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = full_name.strip_prefix(&self.namespace)?;
        let rest = rest.strip_prefix('-')?;
        // Short store names never contain '-', so the first '-' separates
        // name from generation.
        rest.split_once('-')
    }
}
