//! Poller Error Types

use obd_protocol::ObdError;
use thiserror::Error;

/// Errors that stop the poller from starting or running
#[derive(Debug, Error)]
pub enum PollerError {
    /// Configuration could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but holds an unusable value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Adapter or command queue failure
    #[error("OBD error: {0}")]
    Obd(#[from] ObdError),

    /// Snapshot could not be rendered as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A global tracing subscriber was already installed
    #[error("Logging already initialized")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// The poller task is gone
    #[error("Poller stopped")]
    Stopped,
}
