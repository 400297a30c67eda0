//! Error types for the deployment environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Network send failed (buffer full, connection closed, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),
    
    /// Target connection is unreachable (closed or simulated partition)
    #[error("Connection unreachable: {0}")]
    NodeUnreachable(String),
    
    /// Envelope serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
    
    /// Creates an unreachable error.
    pub fn unreachable(target: impl std::fmt::Display) -> Self {
        Self::NodeUnreachable(target.to_string())
    }
}
