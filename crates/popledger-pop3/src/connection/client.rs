//! Type-state POP3 client.

use super::{Pop3Stream, ServerInfo};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_terminator, parse_stat, parse_status_line, unstuff};
use crate::types::{MailboxStat, Response};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout applied to every network read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug)]
pub struct Transaction;

/// POP3 client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: Pop3Stream,
    server_info: ServerInfo,
    timeout: Duration,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait Pop3Connection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;

    /// Returns true if the session is TLS-encrypted.
    fn is_secure(&self) -> bool;

    /// Returns false once the connection was dropped after a failed read or write.
    fn is_open(&self) -> bool;
}

impl<S> Pop3Connection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_secure(&self) -> bool {
        self.stream.is_tls()
    }

    fn is_open(&self) -> bool {
        !self.stream.is_closed()
    }
}

/// A rejected login.
///
/// The server keeps the session in the AUTHORIZATION state after a failed
/// `USER`/`PASS`, so the client is handed back for a clean `QUIT`.
pub struct LoginError {
    /// Why the login failed.
    pub error: Error,
    /// The client, still in the AUTHORIZATION state.
    pub client: Client<Authorization>,
}

impl fmt::Debug for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "login failed: {}", self.error)
    }
}

impl std::error::Error for LoginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl Client<Authorization> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server answers `-ERR`.
    pub async fn from_stream(stream: Pop3Stream, timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream,
            server_info: ServerInfo::default(),
            timeout,
            _state: PhantomData,
        };

        let greeting = client.read_response().await?;
        if !greeting.is_ok() {
            return Err(Error::server(greeting.text));
        }

        client.server_info = ServerInfo::from_greeting(&greeting.text);
        Ok(client)
    }

    /// Upgrades the connection to TLS using STLS.
    ///
    /// A `-ERR` answer leaves the session usable in plain text. A failed
    /// handshake after `+OK` leaves the connection closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects STLS or the upgrade fails.
    pub async fn stls(&mut self, hostname: &str) -> Result<()> {
        if self.stream.is_tls() {
            return Err(Error::Protocol("Already using TLS".into()));
        }

        let reply = self.send_command(&Command::Stls).await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }

        let timeout = self.timeout;
        with_timeout(timeout, self.stream.upgrade_to_tls(hostname)).await
    }

    /// Authenticates with `USER` and `PASS`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoginError`] carrying the client back if either command fails.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> std::result::Result<Client<Transaction>, LoginError> {
        if let Err(error) = self.login_exchange(username, password).await {
            return Err(LoginError {
                error,
                client: self,
            });
        }

        debug!("POP3 login accepted for {username}");
        Ok(Client {
            stream: self.stream,
            server_info: self.server_info,
            timeout: self.timeout,
            _state: PhantomData,
        })
    }

    async fn login_exchange(&mut self, username: &str, password: &str) -> Result<()> {
        let reply = self
            .send_command(&Command::User {
                name: username.to_string(),
            })
            .await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }

        let reply = self
            .send_command(&Command::Pass {
                secret: password.to_string(),
            })
            .await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }

        Ok(())
    }
}

impl Client<Transaction> {
    /// Returns the message count and total maildrop size.
    ///
    /// # Errors
    ///
    /// Returns an error if the STAT command fails or the reply is malformed.
    pub async fn stat(&mut self) -> Result<MailboxStat> {
        let reply = self.send_command(&Command::Stat).await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }
        parse_stat(&reply.text)
    }

    /// Fetches the headers and the first `lines` body lines of a message.
    ///
    /// `top(n, 0)` returns the header block only.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOP command fails.
    pub async fn top(&mut self, msg: u32, lines: u32) -> Result<Vec<u8>> {
        self.fetch_multiline(&Command::Top { msg, lines }).await
    }

    /// Fetches a complete message.
    ///
    /// The returned bytes are the message as sent by the server with
    /// byte-stuffing removed and every line CRLF-terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if the RETR command fails.
    pub async fn retr(&mut self, msg: u32) -> Result<Vec<u8>> {
        self.fetch_multiline(&Command::Retr { msg }).await
    }

    async fn fetch_multiline(&mut self, cmd: &Command) -> Result<Vec<u8>> {
        let reply = self.send_command(cmd).await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }

        let result = read_block(&mut self.stream, self.timeout).await;
        self.drop_if_broken(result)
    }
}

// Common implementation for all states
impl<S> Client<S> {
    async fn send_command(&mut self, cmd: &Command) -> Result<Response> {
        debug!("POP3 > {cmd:?}");
        let data = cmd.serialize();
        let timeout = self.timeout;
        let written = with_timeout(timeout, self.stream.write_all(&data)).await;
        self.drop_if_broken(written)?;
        self.read_response().await
    }

    async fn read_response(&mut self) -> Result<Response> {
        let timeout = self.timeout;
        let line = with_timeout(timeout, self.stream.read_line()).await;
        let response = line.and_then(|line| parse_status_line(&line));
        self.drop_if_broken(response)
    }

    /// Closes the stream when `result` leaves unread or half-written data on it.
    ///
    /// Replies that follow an interrupted exchange cannot be matched to their
    /// command, so every later call fails with [`Error::ConnectionClosed`].
    fn drop_if_broken<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.breaks_session()
            && !self.stream.is_closed()
        {
            warn!("POP3 connection dropped: {e}");
            self.stream.close();
        }
        result
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_ok() {
            return Err(Error::server(reply.text));
        }
        Ok(())
    }
}

/// Reads a dot-terminated block, normalizing line endings to CRLF.
///
/// `timeout` bounds each line, so a slow but steady transfer completes.
async fn read_block(stream: &mut Pop3Stream, timeout: Duration) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let line = with_timeout(timeout, stream.read_line()).await?;
        if is_terminator(&line) {
            break;
        }

        let line = unstuff(&line);
        let content = line
            .strip_suffix(b"\r\n")
            .or_else(|| line.strip_suffix(b"\n"))
            .unwrap_or(line);
        data.extend_from_slice(content);
        data.extend_from_slice(b"\r\n");
    }
    Ok(data)
}

async fn with_timeout<T>(duration: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| Error::Timeout(duration))?
}
