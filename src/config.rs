//! Configuration management for the cachegate proxy

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Configuration for the proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Namespace prefix for all cache store names (default: "cachegate")
    ///
    /// Activation only deletes stores carrying this prefix, so multiple
    /// proxies can share the host's cache storage without interfering.
    #[serde(default = "default_namespace")]
    pub cache_namespace: String,

    /// Generation tag for this deployment (default: "v1")
    ///
    /// Stores are keyed by `{namespace}-{name}-{generation}`; stores from
    /// other generations are purged during activation.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Resources precached into the critical store on install
    #[serde(default)]
    pub critical_urls: Vec<String>,

    /// Resources precached into the static store on install
    #[serde(default)]
    pub important_urls: Vec<String>,

    /// Path marker identifying API requests (default: "/api/")
    #[serde(default = "default_api_marker")]
    pub api_path_marker: String,

    /// Timeout in seconds for network-first fetches (default: 4)
    /// Valid range: 1 to 30
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,

    /// Predictive prefetch settings
    #[serde(default)]
    pub prefetch: PrefetchConfig,

    /// Interval in seconds between metrics pushes to connected clients
    /// (default: 30, 0 disables pushing)
    #[serde(default = "default_metrics_push_interval")]
    pub metrics_push_interval_secs: u64,

    /// Optional origin base URL prepended to relative resource paths
    #[serde(default)]
    pub origin: Option<String>,
}

/// Configuration for the predictive prefetcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrefetchConfig {
    /// Whether predictive prefetching is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of resources prefetched per navigation (default: 10)
    #[serde(default = "default_prefetch_capacity")]
    pub capacity: usize,

    /// Static path -> predicted-resources table
    ///
    /// The table is a configuration input; it can be replaced at runtime
    /// through the configure-strategy control command.
    #[serde(default)]
    pub routes: HashMap<String, Vec<String>>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            capacity: default_prefetch_capacity(),
            routes: HashMap::new(),
        }
    }
}

// Default value functions for serde
fn default_namespace() -> String {
    "cachegate".to_string()
}

fn default_generation() -> String {
    "v1".to_string()
}

fn default_api_marker() -> String {
    "/api/".to_string()
}

fn default_network_timeout() -> u64 {
    4
}

fn default_true() -> bool {
    true
}

fn default_prefetch_capacity() -> usize {
    10
}

fn default_metrics_push_interval() -> u64 {
    30
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            cache_namespace: default_namespace(),
            generation: default_generation(),
            critical_urls: Vec::new(),
            important_urls: Vec::new(),
            api_path_marker: default_api_marker(),
            network_timeout_secs: default_network_timeout(),
            prefetch: PrefetchConfig::default(),
            metrics_push_interval_secs: default_metrics_push_interval(),
            origin: None,
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(ProxyConfig)` if loading and validation succeed
    /// * `Err(ProxyError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ProxyError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ProxyConfig = serde_yaml::from_str(&content)
            .map_err(|e| ProxyError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - cache_namespace and generation must not be empty
    /// - network_timeout_secs must be between 1 and 30
    /// - prefetch capacity must be greater than 0 when prefetching is enabled
    pub fn validate(&self) -> Result<()> {
        const MIN_TIMEOUT: u64 = 1;
        const MAX_TIMEOUT: u64 = 30;

        if self.cache_namespace.is_empty() {
            return Err(ProxyError::ConfigError(
                "cache_namespace must not be empty".to_string(),
            ));
        }

        // A namespace containing '-' would make generation parsing ambiguous
        // when activation splits store names back apart.
        if self.cache_namespace.contains('-') {
            return Err(ProxyError::ConfigError(format!(
                "cache_namespace must not contain '-', got '{}'",
                self.cache_namespace
            )));
        }

        if self.generation.is_empty() {
            return Err(ProxyError::ConfigError(
                "generation must not be empty".to_string(),
            ));
        }

        if self.network_timeout_secs < MIN_TIMEOUT || self.network_timeout_secs > MAX_TIMEOUT {
            return Err(ProxyError::ConfigError(format!(
                "network_timeout_secs must be between {} and {}, got {}",
                MIN_TIMEOUT, MAX_TIMEOUT, self.network_timeout_secs
            )));
        }

        if self.prefetch.enabled && self.prefetch.capacity == 0 {
            return Err(ProxyError::ConfigError(
                "prefetch capacity must be greater than 0 when prefetching is enabled".to_string(),
            ));
        }

        Ok(())
    }
}
