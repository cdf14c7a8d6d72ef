//! Mail retrieval services.
//!
//! The account processor talks to a [`MailTransport`]; [`pop3`] provides
//! the implementation backed by `popledger-pop3`.

pub mod pop3;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use pop3::{Pop3Session, Pop3Transport};
pub use transport::{MailSession, MailTransport, TransportError};
