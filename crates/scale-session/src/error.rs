//! Error types for scale sessions

use scale_detect::DetectError;
use thiserror::Error;

/// Errors that can occur while managing a scale connection
#[derive(Debug, Error)]
pub enum SessionError {
    /// A read was requested with no open connection
    #[error("no active connection")]
    NotConnected,

    /// Probing, opening or reading failed
    #[error(transparent)]
    Detect(#[from] DetectError),
}

impl SessionError {
    /// Whether the caller has to connect again before the next read
    pub fn requires_reconnect(&self) -> bool {
        match self {
            SessionError::NotConnected => true,
            SessionError::Detect(e) => e.requires_reconnect(),
        }
    }
}
