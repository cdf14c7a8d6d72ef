//! Mailbox statistics returned by `STAT`.

/// Message count and total size of a maildrop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxStat {
    /// Number of messages in the maildrop.
    pub count: u32,
    /// Total size of the maildrop in octets.
    pub size: u64,
}

impl MailboxStat {
    /// Returns true if the maildrop holds no messages.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }
}
