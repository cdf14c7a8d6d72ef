//! # popledger-pop3
//!
//! An async POP3 client library implementing RFC 1939, with STLS (RFC 2595).
//!
//! ## Features
//!
//! - **Type-state connection management**: commands that need an
//!   authenticated session only exist on `Client<Transaction>`
//! - **TLS support**: both implicit TLS (port 995) and STLS upgrade
//! - **Raw message access**: `TOP` and `RETR` return the message bytes with
//!   byte-stuffing removed, never decoded
//! - **Timeouts**: every network round trip is bounded
//!
//! ## Quick Start
//!
//! ```ignore
//! use popledger_pop3::connection::{connect, Client, DEFAULT_TIMEOUT};
//!
//! #[tokio::main]
//! async fn main() -> popledger_pop3::Result<()> {
//!     let stream = connect("pop.example.com", 110, DEFAULT_TIMEOUT).await?;
//!     let mut client = Client::from_stream(stream, DEFAULT_TIMEOUT).await?;
//!
//!     // Upgrade to TLS, keep going in plain text if the server refuses
//!     let _ = client.stls("pop.example.com").await;
//!
//!     let mut client = client
//!         .login("user@example.com", "password")
//!         .await
//!         .map_err(|e| e.error)?;
//!
//!     let stat = client.stat().await?;
//!     for n in 1..=stat.count {
//!         let headers = client.top(n, 0).await?;
//!         println!("{} header bytes", headers.len());
//!     }
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌───────────────┐
//! │ Authorization │ ─── login() ───→ Transaction ─── quit() ───→ (closed)
//! └───────────────┘
//!        │
//!        └─── stls() (stays in Authorization)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authorization, Client, IMPLICIT_TLS_PORT, LoginError, Pop3Connection, Pop3Stream, ServerInfo,
    Transaction,
};
pub use error::{Error, Result};
pub use types::{MailboxStat, Response, Status};
