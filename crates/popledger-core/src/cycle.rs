//! One polling cycle: load the index, process every account, save once.

use tracing::{debug, error, info, warn};

use crate::account::{Account, load_accounts};
use crate::config::{Config, Paths};
use crate::error::Result;
use crate::index::IndexStore;
use crate::persist::MessagePersister;
use crate::processor::{AccountProcessor, AccountReport};
use crate::service::{MailTransport, Pop3Transport};
use crate::temporal::{DateAuditLog, TemporalNormalizer};

/// Summary of a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// One report per account, in processing order.
    pub accounts: Vec<AccountReport>,
    /// Whether the index document was written.
    pub index_saved: bool,
    /// Index size at the end of the cycle.
    pub total_records: usize,
}

impl CycleReport {
    /// Messages indexed during the cycle.
    #[must_use]
    pub fn new_messages(&self) -> usize {
        self.accounts.iter().map(|a| a.new).sum()
    }

    /// Messages that failed during the cycle.
    #[must_use]
    pub fn failed_messages(&self) -> usize {
        self.accounts.iter().map(|a| a.failed).sum()
    }

    /// Accounts that did not finish.
    #[must_use]
    pub fn aborted_accounts(&self) -> usize {
        self.accounts.iter().filter(|a| !a.is_done()).count()
    }
}

/// Processes `accounts` sequentially against one in-memory index.
///
/// The index is saved once, after the last account. A failed save is logged
/// and reported through [`CycleReport::index_saved`].
///
/// # Errors
///
/// Returns an error only if the index cannot be loaded under the `fail`
/// corrupt-index policy; the document is then left untouched.
pub async fn run_cycle<T: MailTransport>(
    transport: &T,
    accounts: &[Account],
    store: &IndexStore,
    persister: &MessagePersister,
    paths: &Paths,
) -> Result<CycleReport> {
    let mut index = store.load().await?;
    let processor = AccountProcessor::new(transport, persister, paths);

    let mut report = CycleReport::default();
    for account in accounts {
        report.accounts.push(processor.process(account, &mut index).await);
    }

    report.total_records = index.len();
    debug!(
        "Saving index: {} added, {} total",
        index.added(),
        report.total_records
    );
    match store.save(&index).await {
        Ok(()) => report.index_saved = true,
        Err(e) => error!("Failed to save index: {e}"),
    }

    info!(
        "Cycle finished: {} account(s), {} new, {} failed message(s), {} aborted account(s), {} record(s) total",
        report.accounts.len(),
        report.new_messages(),
        report.failed_messages(),
        report.aborted_accounts(),
        report.total_records
    );
    Ok(report)
}

/// Everything a cycle needs, built from the configuration.
#[derive(Debug)]
pub struct Ledger<T> {
    paths: Paths,
    transport: T,
    store: IndexStore,
    persister: MessagePersister,
}

impl Ledger<Pop3Transport> {
    /// Creates a ledger using POP3.
    #[must_use]
    pub fn pop3(paths: Paths, config: &Config) -> Self {
        Self::new(paths, config, Pop3Transport::new(config.io_timeout()))
    }
}

impl<T: MailTransport> Ledger<T> {
    /// Creates a ledger with a custom transport.
    #[must_use]
    pub fn new(paths: Paths, config: &Config, transport: T) -> Self {
        let normalizer = TemporalNormalizer::new(&config.target_timezone)
            .with_audit_log(DateAuditLog::new(&paths.logs));
        let persister = MessagePersister::new(&paths.emails, normalizer, config.max_filename_len);
        let store = IndexStore::new(&paths.index, config.corrupt_index_policy);
        Self {
            paths,
            transport,
            store,
            persister,
        }
    }

    /// Data layout in use.
    #[must_use]
    pub const fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Reads the accounts file and runs one cycle.
    ///
    /// Without accounts nothing is loaded or saved and `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the accounts file cannot be read or the index
    /// cannot be loaded under the `fail` policy.
    pub async fn run_once(&self) -> Result<Option<CycleReport>> {
        let accounts = load_accounts(&self.paths.accounts).await?;
        if accounts.is_empty() {
            warn!(
                "No accounts configured in {}",
                self.paths.accounts.display()
            );
            return Ok(None);
        }

        info!("Starting cycle for {} account(s)", accounts.len());
        run_cycle(
            &self.transport,
            &accounts,
            &self.store,
            &self.persister,
            &self.paths,
        )
        .await
        .map(Some)
    }
}
