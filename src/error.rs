//! Error types for the cachegate proxy

use thiserror::Error;

/// Result type alias for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Error types that can occur in the proxy
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Network timeout: {0}")]
    Timeout(String),

    #[error("Origin returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Control channel error: {0}")]
    ControlError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::IoError(err.to_string())
    }
}

impl ProxyError {
    /// Determine if this error is a network fault
    ///
    /// Network faults (connection failures, timeouts, non-success origin
    /// statuses) drive the fallback branch of the owning strategy. Store
    /// faults and everything else are handled locally at the call site.
    pub fn is_network_fault(&self) -> bool {
        matches!(
            self,
            ProxyError::NetworkError(_) | ProxyError::Timeout(_) | ProxyError::HttpStatus { .. }
        )
    }

    /// Convert error to an HTTP status code for surfaced failures
    ///
    /// Only strategies without a local fallback surface errors, and even
    /// then as a well-formed response carrying this status.
    pub fn to_http_status(&self) -> u16 {
        match self {
            ProxyError::Timeout(_) => 504,
            ProxyError::NetworkError(_) => 502,
            ProxyError::HttpStatus { status, .. } => *status,
            ProxyError::ParseError(_) => 400,
            ProxyError::ConfigError(_) => 500,
            ProxyError::StoreError(_) => 500,
            ProxyError::ControlError(_) => 500,
            ProxyError::IoError(_) => 500,
            ProxyError::InternalError(_) => 500,
        }
    }

    /// Create an error from a non-success origin status code
    pub fn from_status(status: u16, url: impl Into<String>) -> Self {
        ProxyError::HttpStatus {
            status,
            url: url.into(),
        }
    }
}
