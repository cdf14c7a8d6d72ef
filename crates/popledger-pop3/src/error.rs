//! Error types for POP3 operations.

use std::io;
use std::time::Duration;

/// Result type alias for POP3 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// POP3 error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Server answered with `-ERR`.
    #[error("POP3 server error: {0}")]
    Server(String),

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation did not complete within the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection was closed by the server or lost during a TLS upgrade.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    /// Creates a server error from a `-ERR` response text.
    #[must_use]
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Returns true if the connection can no longer be trusted to stay in
    /// step with the commands sent on it.
    ///
    /// A `-ERR` reply is a complete answer and leaves the session usable.
    #[must_use]
    pub const fn breaks_session(&self) -> bool {
        !matches!(self, Self::Server(_))
    }
}
