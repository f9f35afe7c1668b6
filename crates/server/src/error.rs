//! Server error types

use std::net::SocketAddr;

use thiserror::Error;

/// Server startup and runtime errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// TLS material could not be loaded
    #[error("tls error: {0}")]
    Tls(String),

    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A listener stopped with an error
    #[error("listener {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a TLS error
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }
}
