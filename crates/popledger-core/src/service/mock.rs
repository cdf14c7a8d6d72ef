//! In-memory transport for processor and cycle tests.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use popledger_pop3::MailboxStat;

use super::transport::{MailSession, MailTransport, TransportError};
use crate::account::Security;

/// One server-side maildrop.
#[derive(Debug, Clone, Default)]
pub struct MockMailbox {
    pub secret: String,
    pub messages: Vec<Vec<u8>>,
    pub refuse_stls: bool,
    pub fail_stat: bool,
    pub fail_top: HashSet<u32>,
    pub fail_retr: HashSet<u32>,
    /// `RETR n` times out partway and drops the connection.
    pub stall_retr: Option<u32>,
}

impl MockMailbox {
    pub fn new(secret: &str, messages: Vec<Vec<u8>>) -> Self {
        Self {
            secret: secret.to_string(),
            messages,
            ..Self::default()
        }
    }
}

/// Transport serving mailboxes keyed by host, recording every call.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    mailboxes: Arc<Mutex<HashMap<String, MockMailbox>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mailbox(self, host: &str, mailbox: MockMailbox) -> Self {
        self.mailboxes
            .lock()
            .unwrap()
            .insert(host.to_string(), mailbox);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, host: &str) -> Vec<String> {
        let prefix = format!("{host} ");
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, host: &str, call: &str) -> usize {
        self.calls_for(host).iter().filter(|c| *c == call).count()
    }
}

impl MailTransport for MockTransport {
    type Session = MockSession;

    async fn connect(
        &self,
        host: &str,
        _port: u16,
        security: Security,
    ) -> Result<MockSession, TransportError> {
        self.calls.lock().unwrap().push(format!("{host} CONNECT"));
        let mailbox = self
            .mailboxes
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| TransportError::Connection(format!("unknown host {host}")))?;

        Ok(MockSession {
            host: host.to_string(),
            mailbox,
            secure: security == Security::Tls,
            authenticated: false,
            open: true,
            calls: Arc::clone(&self.calls),
        })
    }
}

#[derive(Debug)]
pub struct MockSession {
    host: String,
    mailbox: MockMailbox,
    secure: bool,
    authenticated: bool,
    open: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSession {
    fn record(&self, call: String) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {call}", self.host));
    }

    fn message(&self, number: u32) -> Result<&Vec<u8>, TransportError> {
        if !self.open {
            return Err(TransportError::Protocol("Connection closed".into()));
        }
        if !self.authenticated {
            return Err(TransportError::Protocol("not authenticated".into()));
        }
        number
            .checked_sub(1)
            .and_then(|i| self.mailbox.messages.get(i as usize))
            .ok_or_else(|| TransportError::Protocol(format!("no such message {number}")))
    }
}

impl MailSession for MockSession {
    fn is_secure(&self) -> bool {
        self.secure
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn negotiate_security(&mut self, _host: &str) -> Result<(), TransportError> {
        self.record("STLS".into());
        if self.mailbox.refuse_stls {
            return Err(TransportError::SecurityUpgrade("STLS not supported".into()));
        }
        self.secure = true;
        Ok(())
    }

    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<(), TransportError> {
        self.record(format!("AUTH {identity}"));
        if secret != self.mailbox.secret {
            return Err(TransportError::Authentication("invalid password".into()));
        }
        self.authenticated = true;
        Ok(())
    }

    async fn mailbox_status(&mut self) -> Result<MailboxStat, TransportError> {
        self.record("STAT".into());
        if self.mailbox.fail_stat || !self.authenticated {
            return Err(TransportError::Protocol("STAT failed".into()));
        }
        Ok(MailboxStat {
            count: u32::try_from(self.mailbox.messages.len()).unwrap(),
            size: self.mailbox.messages.iter().map(|m| m.len() as u64).sum(),
        })
    }

    async fn fetch_headers(&mut self, number: u32) -> Result<Vec<u8>, TransportError> {
        self.record(format!("TOP {number}"));
        let raw = self.message(number)?;
        if self.mailbox.fail_top.contains(&number) {
            return Err(TransportError::Protocol(format!("TOP {number} failed")));
        }
        let end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .map_or(raw.len(), |i| i + 4);
        Ok(raw[..end].to_vec())
    }

    async fn fetch_full(&mut self, number: u32) -> Result<Vec<u8>, TransportError> {
        self.record(format!("RETR {number}"));
        let raw = self.message(number)?.clone();
        if self.mailbox.fail_retr.contains(&number) {
            return Err(TransportError::Protocol(format!("RETR {number} failed")));
        }
        if self.mailbox.stall_retr == Some(number) {
            self.open = false;
            return Err(TransportError::Protocol("Operation timed out".into()));
        }
        Ok(raw)
    }

    async fn close(self) -> Result<(), TransportError> {
        self.record("QUIT".into());
        Ok(())
    }
}

/// Builds a small raw message.
pub fn raw_message(subject: &str, date: &str) -> Vec<u8> {
    format!(
        "From: Sender <sender@example.com>\r\n\
         To: alice@example.com\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Message-ID: <{subject}@example.com>\r\n\
         \r\n\
         Body of {subject}\r\n"
    )
    .into_bytes()
}
