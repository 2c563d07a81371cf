//! Transport error taxonomy
//!
//! Every transport failure maps to a [`FaultKind`]; the monitor and the
//! handshake match on the kind to decide whether to back off, tear down,
//! or log and continue.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HID enumeration failed: {0}")]
    Enumerate(String),

    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Device removed: {0}")]
    Removed(String),

    #[error("HID I/O error: {0}")]
    Transient(String),

    #[error("Handle already closed")]
    Closed,
}

/// How the caller should react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Device not (fully) present; wait and rediscover
    DiscoveryMiss,
    /// An interface could not be opened; close the pair and rediscover
    OpenFailure,
    /// Device went away; tear down the session and reset link state
    Removal,
    /// Log and keep going
    Transient,
}

impl TransportError {
    pub fn kind(&self) -> FaultKind {
        match self {
            TransportError::Enumerate(_) => FaultKind::DiscoveryMiss,
            TransportError::Open { .. } => FaultKind::OpenFailure,
            TransportError::Removed(_) => FaultKind::Removal,
            TransportError::Transient(_) | TransportError::Closed => FaultKind::Transient,
        }
    }
}
