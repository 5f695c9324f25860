//! Error types shared across transports and the listener.

use thiserror::Error;

/// A failure of a single outbound transaction (UDP or DoH).
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response arrived before the per-attempt deadline.
    #[error("timed out waiting for upstream response")]
    Timeout,
    /// A lower-level network error (socket, connect, or transport-level failure).
    #[error("network error: {0}")]
    Network(#[source] std::io::Error),
    /// The upstream HTTP server returned a non-200 status.
    #[error("upstream returned HTTP status {0}")]
    HttpStatus(u16),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> TransportError {
        if err.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout
        } else {
            TransportError::Network(err)
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(std::io::Error::other(err.to_string()))
        }
    }
}

/// A fatal failure to bind the listener socket at startup.
#[derive(Debug, Error)]
#[error("failed to bind to {addr}: {source}")]
pub struct BindError {
    pub addr: std::net::SocketAddr,
    #[source]
    pub source: std::io::Error,
}
