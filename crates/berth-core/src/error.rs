//! Error taxonomy for deployment operations.

use std::time::Duration;

/// Result type for provider and configuration operations.
pub type Result<T> = std::result::Result<T, DeployError>;

/// Errors that can occur while resolving configuration or talking to the
/// remote platform.
///
/// Configuration problems are raised before any remote call; transport and
/// provider failures propagate immediately and are never retried by this
/// crate (only status polling repeats, and only for convergence).
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Missing credentials, unresolvable environment name, invalid config
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or TLS failure talking to a remote API
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote API answered with a non-success status
    #[error("provider rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    /// A readiness poll exceeded its configured deadline
    #[error("timed out after {waited:?} waiting for the environment to converge")]
    TimedOut { waited: Duration },

    /// Local I/O error (artifact reading, bundling)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        DeployError::Configuration(msg.into())
    }
}
