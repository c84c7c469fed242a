//! Domain-specific error types for appwatch.
//!
//! All fallible operations return `Result<T, AppWatchError>`.
//! [`AppWatchError::is_connection_fatal`] tells the session and command
//! loops whether an error ends the current client connection.

use thiserror::Error;

/// The canonical error type for appwatch.
#[derive(Debug, Error)]
pub enum AppWatchError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    // ── Serialization Errors ─────────────────────────────────────
    /// The application name could not be copied into its wire buffer.
    #[error("cannot copy application name into the send buffer")]
    NameCopy,

    /// A variable-length field exceeds what the wire format allows.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A received frame violated the wire format.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Collaborator Errors ──────────────────────────────────────
    /// The set of running applications could not be captured.
    #[error("snapshot capture failed: {0}")]
    Enumeration(String),

    /// Synthesized input could not be delivered to the OS.
    #[error("input injection failed: {0}")]
    Injection(String),

    /// The operation has no implementation on this platform.
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl AppWatchError {
    /// Whether this error must tear down the client connection.
    ///
    /// Transport and serialization failures are fatal; enumeration and
    /// injection failures only abort the current cycle or command.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            AppWatchError::Connection(_)
            | AppWatchError::NameCopy
            | AppWatchError::PayloadTooLarge { .. }
            | AppWatchError::UnknownVariant { .. }
            | AppWatchError::ProtocolViolation(_)
            | AppWatchError::Other(_) => true,
            AppWatchError::Enumeration(_)
            | AppWatchError::Injection(_)
            | AppWatchError::Unsupported(_) => false,
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for AppWatchError {
    fn from(s: String) -> Self {
        AppWatchError::Other(s)
    }
}

impl From<&str> for AppWatchError {
    fn from(s: &str) -> Self {
        AppWatchError::Other(s.to_string())
    }
}
