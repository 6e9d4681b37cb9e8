//! Error types for scale detection

use thiserror::Error;

/// Errors that can occur while opening, probing or reading a scale
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Device path could not be opened (absent, busy, permissions)
    #[error("failed to open port {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// Every candidate serial configuration failed to open
    #[error("no valid configuration for {port} after {attempts} attempt(s): {last_reason}")]
    NoValidConfiguration {
        port: String,
        attempts: usize,
        last_reason: String,
    },

    /// I/O error on an already open handle
    #[error("communication failure on {port}: {reason}")]
    CommunicationFailure { port: String, reason: String },
}

impl DetectError {
    /// Wrap an I/O error raised by an open handle
    pub fn communication(port: &str, err: std::io::Error) -> Self {
        DetectError::CommunicationFailure {
            port: port.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether the caller must reconnect before reading again
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, DetectError::CommunicationFailure { .. })
    }
}
