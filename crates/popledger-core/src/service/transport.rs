//! Retrieval capability consumed by the account processor.

use popledger_pop3::MailboxStat;

use crate::account::Security;

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached or the greeting failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Upgrading to TLS failed. Never fatal on its own.
    #[error("Security upgrade failed: {0}")]
    SecurityUpgrade(String),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A command failed, timed out or got a malformed answer.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Opens sessions to a mail server.
#[allow(async_fn_in_trait)]
pub trait MailTransport {
    /// Session type produced by [`MailTransport::connect`].
    type Session: MailSession;

    /// Connects and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] if the server cannot be reached.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        security: Security,
    ) -> Result<Self::Session, TransportError>;
}

/// An open session with a maildrop.
///
/// Messages are addressed by their 1-based number within the session.
#[allow(async_fn_in_trait)]
pub trait MailSession: Sized {
    /// Returns true if the session is encrypted.
    fn is_secure(&self) -> bool;

    /// Returns false once the connection was dropped.
    ///
    /// After a timeout or I/O failure partway through a reply, no further
    /// command may be sent on the session.
    fn is_open(&self) -> bool;

    /// Upgrades a plain session to TLS.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SecurityUpgrade`] if the upgrade fails.
    async fn negotiate_security(&mut self, host: &str) -> Result<(), TransportError>;

    /// Logs in.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Authentication`] if the credentials are rejected.
    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<(), TransportError>;

    /// Message count and total size.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] on failure.
    async fn mailbox_status(&mut self) -> Result<MailboxStat, TransportError>;

    /// Header section of one message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] on failure.
    async fn fetch_headers(&mut self, number: u32) -> Result<Vec<u8>, TransportError>;

    /// Complete raw message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Protocol`] on failure.
    async fn fetch_full(&mut self, number: u32) -> Result<Vec<u8>, TransportError>;

    /// Ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not acknowledge the close.
    async fn close(self) -> Result<(), TransportError>;
}
