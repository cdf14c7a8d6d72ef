//! Account model types.

use std::fmt;

use popledger_pop3::IMPLICIT_TLS_PORT;

/// Transport security mode for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Implicit TLS (connect directly with TLS).
    Tls,
    /// Plain connect followed by an `STLS` upgrade attempt.
    StartTls,
}

impl Security {
    /// Selects the mode for a port: implicit TLS on 995, `STLS` elsewhere.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        if port == IMPLICIT_TLS_PORT {
            Self::Tls
        } else {
            Self::StartTls
        }
    }
}

/// A POP3 account credential.
///
/// Immutable once parsed. The `Debug` output never shows the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// Login name; also names the account's storage directory.
    pub identity: String,
    /// Password.
    pub secret: String,
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Account {
    /// Creates an account credential.
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        secret: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
            host: host.into(),
            port,
        }
    }

    /// Security mode derived from the port.
    #[must_use]
    pub const fn security(&self) -> Security {
        Security::for_port(self.port)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.identity, self.host, self.port)
    }
}
