//! # popledger-core
//!
//! Deduplicating download, persistence and metadata indexing for `PopLedger`.
//!
//! This crate provides:
//! - Account credentials and the `accounts.txt` parser
//! - Header fingerprints used to skip already-downloaded messages
//! - Date normalization into a fixed timezone, with a diagnostic log
//! - Sender/recipient/subject extraction and filename derivation
//! - Message files plus a consolidated JSON metadata index
//! - The per-account state machine and the polling cycle
//!
//! ```text
//! Ledger::run_once
//!   └─ for each account: AccountProcessor
//!        └─ TOP n 0 → Fingerprint → seen? skip : RETR n → MessagePersister → MetadataIndex
//!   └─ IndexStore::save (once per cycle)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod config;
pub mod cycle;
mod error;
pub mod fingerprint;
pub mod identity;
pub mod index;
pub mod persist;
pub mod processor;
pub mod service;
pub mod temporal;

pub use account::{Account, AccountLineError, Security, load_accounts, parse_accounts};
pub use config::{Config, CorruptIndexPolicy, Paths};
pub use cycle::{CycleReport, Ledger, run_cycle};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use index::{IndexEntry, IndexError, IndexStore, MetadataIndex};
pub use persist::{MessagePersister, MetadataRecord, PersistError};
pub use processor::{AccountProcessor, AccountReport, AccountState, MessageError, MessageOutcome};
pub use service::{MailSession, MailTransport, Pop3Session, Pop3Transport, TransportError};
pub use temporal::{DateAuditLog, DateResolution, TemporalNormalizer, Timestamp};
