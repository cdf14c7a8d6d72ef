//! # popledger-mime
//!
//! Header-level parsing for messages downloaded over POP3.
//!
//! ## Features
//!
//! - **Headers**: ordered, case-insensitive, duplicates kept
//! - **Encoded words**: RFC 2047 `B` and `Q` decoding for subjects and names
//! - **Addresses**: display name / address extraction and list splitting
//! - **Dates**: strict RFC 5322 parsing with a loose fallback
//!
//! ## Quick Start
//!
//! ```
//! use popledger_mime::Message;
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             Subject: Test\r\n\
//!             Date: Mon, 02 Jan 2006 15:04:05 -0600\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject(), Some("Test"));
//! assert_eq!(message.from_header(), Some("Alice <alice@example.com>"));
//!
//! let date = message.date_raw().and_then(popledger_mime::date::parse_date);
//! assert!(date.is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod message;

pub mod address;
pub mod date;
pub mod encoding;

pub use address::Address;
pub use date::{DateSource, ParsedDate};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::Message;
