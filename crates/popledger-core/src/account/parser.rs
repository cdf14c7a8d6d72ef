//! `accounts.txt` parsing.
//!
//! One account per line in the form `identity:secret@host:port`. The identity
//! ends at the first `:`, the host part starts after the last `@`, and the
//! port follows the last `:` of the host part.

use std::path::Path;

use tracing::{debug, warn};

use super::model::Account;
use crate::error::Result;

/// Why an accounts line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountLineError {
    /// No `:` separating identity and secret.
    #[error("missing ':' after the identity")]
    MissingIdentitySeparator,
    /// No `@` separating secret and host.
    #[error("missing '@' before the host")]
    MissingHostSeparator,
    /// No `:` separating host and port.
    #[error("missing ':' before the port")]
    MissingPort,
    /// Identity or host is empty.
    #[error("empty {0}")]
    EmptyField(&'static str),
    /// Port is not a number in 1..=65535.
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}

/// Parses a single `identity:secret@host:port` line.
///
/// # Errors
///
/// Returns an [`AccountLineError`] describing the first structural problem.
pub fn parse_line(line: &str) -> std::result::Result<Account, AccountLineError> {
    let line = line.trim();
    let (identity, rest) = line
        .split_once(':')
        .ok_or(AccountLineError::MissingIdentitySeparator)?;
    let (secret, host_port) = rest
        .rsplit_once('@')
        .ok_or(AccountLineError::MissingHostSeparator)?;
    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or(AccountLineError::MissingPort)?;

    let identity = identity.trim();
    let host = host.trim();
    if identity.is_empty() {
        return Err(AccountLineError::EmptyField("identity"));
    }
    if host.is_empty() {
        return Err(AccountLineError::EmptyField("host"));
    }

    let port = port.trim();
    let port = match port.parse::<u16>() {
        Ok(0) | Err(_) => return Err(AccountLineError::InvalidPort(port.to_string())),
        Ok(p) => p,
    };

    Ok(Account::new(identity, secret, host, port))
}

/// Parses the contents of an accounts file.
///
/// Blank lines and `#` comments are skipped. Malformed lines are logged with
/// their line number and skipped.
#[must_use]
pub fn parse_accounts(contents: &str) -> Vec<Account> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .filter_map(|(idx, line)| match parse_line(line) {
            Ok(account) => Some(account),
            Err(e) => {
                warn!("Skipping accounts line {}: {e}", idx + 1);
                None
            }
        })
        .collect()
}

/// Reads and parses the accounts file.
///
/// A missing file yields no accounts.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub async fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Accounts file {} not found", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let accounts = parse_accounts(&contents);
    debug!("Loaded {} account(s) from {}", accounts.len(), path.display());
    Ok(accounts)
}
