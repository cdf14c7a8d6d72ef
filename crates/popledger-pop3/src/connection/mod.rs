//! POP3 connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authorization, Client, DEFAULT_TIMEOUT, LoginError, Pop3Connection, Transaction};
pub use stream::{Pop3Stream, connect, connect_tls};

/// Port on which servers expect TLS from the first byte (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 995;

/// Server information from the greeting.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Greeting text after `+OK`.
    pub greeting: String,
}

impl ServerInfo {
    /// Builds server information from the greeting text.
    #[must_use]
    pub fn from_greeting(text: &str) -> Self {
        Self {
            greeting: text.to_string(),
        }
    }
}
