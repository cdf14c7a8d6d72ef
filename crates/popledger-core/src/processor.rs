//! Per-account download orchestration.
//!
//! ```text
//! Connecting → Authenticating → ListingMailbox → IteratingMessages → Closing → Done
//!      └──────────────┴────────────────┴──→ Aborted
//! ```
//!
//! A failing message is logged and skipped; a failing account never affects
//! the next one. Once the connection drops, the remaining messages are
//! counted as failed without sending further commands.

use std::fmt;

use popledger_mime::Message;
use tracing::{debug, error, info, warn};

use crate::account::{Account, Security};
use crate::config::Paths;
use crate::fingerprint::Fingerprint;
use crate::index::MetadataIndex;
use crate::persist::{MessagePersister, PersistError};
use crate::service::{MailSession, MailTransport, TransportError};

/// Stage of an account's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Opening the connection.
    Connecting,
    /// Sending credentials.
    Authenticating,
    /// Reading the maildrop size.
    ListingMailbox,
    /// Fingerprinting and downloading messages.
    IteratingMessages,
    /// Ending the session.
    Closing,
    /// Finished normally.
    Done,
    /// Stopped early; see [`AccountReport::aborted_at`].
    Aborted,
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::ListingMailbox => "listing mailbox",
            Self::IteratingMessages => "iterating messages",
            Self::Closing => "closing",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of processing one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    /// Account identity.
    pub identity: String,
    /// Final state: [`AccountState::Done`] or [`AccountState::Aborted`].
    pub state: AccountState,
    /// Stage at which processing stopped, if aborted.
    pub aborted_at: Option<AccountState>,
    /// Error that aborted the account.
    pub error: Option<TransportError>,
    /// Messages downloaded and indexed.
    pub new: usize,
    /// Messages already in the index.
    pub skipped: usize,
    /// Messages that failed.
    pub failed: usize,
}

impl AccountReport {
    fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            state: AccountState::Connecting,
            aborted_at: None,
            error: None,
            new: 0,
            skipped: 0,
            failed: 0,
        }
    }

    fn abort(mut self, error: TransportError) -> Self {
        self.aborted_at = Some(self.state);
        self.state = AccountState::Aborted;
        self.error = Some(error);
        self
    }

    /// Returns true if the account finished normally.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == AccountState::Done
    }
}

/// Why a single message was not indexed.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Fetching failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Writing failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Downloaded, written and indexed.
    New,
    /// Fingerprint already in the index.
    Skipped,
}

/// Runs one account through the download state machine.
#[derive(Debug)]
pub struct AccountProcessor<'a, T> {
    transport: &'a T,
    persister: &'a MessagePersister,
    paths: &'a Paths,
}

impl<'a, T: MailTransport> AccountProcessor<'a, T> {
    /// Creates a processor.
    #[must_use]
    pub const fn new(transport: &'a T, persister: &'a MessagePersister, paths: &'a Paths) -> Self {
        Self {
            transport,
            persister,
            paths,
        }
    }

    /// Downloads every message of `account` not yet in `index`.
    ///
    /// Never fails; the outcome is described by the returned report.
    pub async fn process(&self, account: &Account, index: &mut MetadataIndex) -> AccountReport {
        let identity = account.identity.as_str();
        let mut report = AccountReport::new(identity);
        info!("Processing account {account}");

        // Connecting
        let security = account.security();
        let mut session = match self
            .transport
            .connect(&account.host, account.port, security)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                error!("[{identity}] Failed to connect to {}:{}: {e}", account.host, account.port);
                return report.abort(e);
            }
        };
        if security == Security::StartTls
            && let Err(e) = session.negotiate_security(&account.host).await
        {
            warn!("[{identity}] {e}");
        }
        if session.is_secure() {
            debug!("[{identity}] Session is encrypted");
        } else {
            warn!("[{identity}] Continuing without TLS");
        }

        // Authenticating
        report.state = AccountState::Authenticating;
        if let Err(e) = session.authenticate(identity, &account.secret).await {
            error!("[{identity}] {e}");
            close_quietly(identity, session).await;
            return report.abort(e);
        }

        // ListingMailbox
        report.state = AccountState::ListingMailbox;
        let stat = match session.mailbox_status().await {
            Ok(stat) => stat,
            Err(e) => {
                error!("[{identity}] Failed to list mailbox: {e}");
                close_quietly(identity, session).await;
                return report.abort(e);
            }
        };
        info!("[{identity}] {} message(s), {} bytes", stat.count, stat.size);

        let account_dir = self.paths.account_dir(identity);
        if let Err(e) = tokio::fs::create_dir_all(&account_dir).await {
            error!(
                "[{identity}] Failed to create {}: {e}",
                account_dir.display()
            );
        }

        // IteratingMessages
        report.state = AccountState::IteratingMessages;
        for number in 1..=stat.count {
            if !session.is_open() {
                let remaining = stat.count - number + 1;
                report.failed += usize::try_from(remaining).unwrap_or(usize::MAX);
                error!(
                    "[{identity}] Connection lost, {remaining} message(s) from {number} left for the next cycle"
                );
                break;
            }
            match self
                .process_message(&mut session, identity, number, index)
                .await
            {
                Ok(MessageOutcome::New) => report.new += 1,
                Ok(MessageOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("[{identity}] Message {number} failed: {e}");
                }
            }
        }

        // Closing
        report.state = AccountState::Closing;
        close_quietly(identity, session).await;

        report.state = AccountState::Done;
        info!(
            "[{identity}] Done: {} new, {} already indexed, {} failed",
            report.new, report.skipped, report.failed
        );
        report
    }

    /// Fingerprints one message and downloads it if unseen.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching or writing fails; the fingerprint is then
    /// not registered.
    pub async fn process_message(
        &self,
        session: &mut T::Session,
        identity: &str,
        number: u32,
        index: &mut MetadataIndex,
    ) -> Result<MessageOutcome, MessageError> {
        let headers = session.fetch_headers(number).await?;
        let fingerprint = Fingerprint::of_raw(&headers);
        if index.contains(&fingerprint) {
            debug!("[{identity}] Message {number} already indexed ({})", fingerprint.short(10));
            return Ok(MessageOutcome::Skipped);
        }

        let raw = session.fetch_full(number).await?;
        let message = Message::parse(&raw);
        let record = self
            .persister
            .persist(identity, &raw, &message, &fingerprint)
            .await?;
        debug!("[{identity}] Message {number} saved as {}", record.name);
        index.insert(record);
        Ok(MessageOutcome::New)
    }
}

async fn close_quietly<S: MailSession>(identity: &str, session: S) {
    if let Err(e) = session.close().await {
        warn!("[{identity}] Failed to close session: {e}");
    }
}
