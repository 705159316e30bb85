//! Error types for the request probe core.
//!
//! # Design
//! Translation and classification never fail; they degrade to defaults. The
//! only fallible seams are the transport a host plugs in and configuration
//! loading. `TransportError` is never propagated past the dispatch adapter:
//! it is rendered into a response-shaped value instead.

use thiserror::Error;

/// Failures reported by a `Transport`, or raised by the adapter before the
/// transport is called.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the connection while the body was being written.
    #[error("broken pipe: connection closed while sending request")]
    BrokenPipe,

    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("request timed out")]
    Timeout,

    /// The request cannot be sent at all, e.g. it has no URL.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other network-level failure (DNS, refused connection, TLS, ...).
    #[error("network error: {0}")]
    Network(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::BrokenPipe => TransportError::BrokenPipe,
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Network(err.to_string()),
        }
    }
}

/// Errors raised while loading a `ProbeConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A method string that names none of the supported verbs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);
