//! POP3 implementation of the retrieval capability.

use std::time::Duration;

use popledger_pop3::connection::{DEFAULT_TIMEOUT, connect, connect_tls};
use popledger_pop3::{Authorization, Client, LoginError, MailboxStat, Pop3Connection, Transaction};
use tracing::debug;

use super::transport::{MailSession, MailTransport, TransportError};
use crate::account::Security;

/// Opens POP3 sessions with a fixed per-operation timeout.
#[derive(Debug, Clone, Copy)]
pub struct Pop3Transport {
    timeout: Duration,
}

impl Default for Pop3Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Pop3Transport {
    /// Creates a transport applying `timeout` to every network round trip.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl MailTransport for Pop3Transport {
    type Session = Pop3Session;

    async fn connect(
        &self,
        host: &str,
        port: u16,
        security: Security,
    ) -> Result<Pop3Session, TransportError> {
        let stream = match security {
            Security::Tls => connect_tls(host, port, self.timeout).await,
            Security::StartTls => connect(host, port, self.timeout).await,
        }
        .map_err(|e| TransportError::Connection(e.to_string()))?;

        let client = Client::from_stream(stream, self.timeout)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        debug!("Connected to {host}:{port}: {}", client.server_info().greeting);

        Ok(Pop3Session {
            state: SessionState::Authorization(client),
        })
    }
}

enum SessionState {
    Authorization(Client<Authorization>),
    Transaction(Client<Transaction>),
    Closed,
}

/// A POP3 session moving from AUTHORIZATION to TRANSACTION.
pub struct Pop3Session {
    state: SessionState,
}

impl std::fmt::Debug for Pop3Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            SessionState::Authorization(_) => "Authorization",
            SessionState::Transaction(_) => "Transaction",
            SessionState::Closed => "Closed",
        };
        f.debug_struct("Pop3Session").field("state", &state).finish()
    }
}

impl Pop3Session {
    fn transaction(&mut self) -> Result<&mut Client<Transaction>, TransportError> {
        match &mut self.state {
            SessionState::Transaction(client) => Ok(client),
            _ => Err(TransportError::Protocol("not authenticated".into())),
        }
    }
}

fn protocol(e: popledger_pop3::Error) -> TransportError {
    TransportError::Protocol(e.to_string())
}

impl MailSession for Pop3Session {
    fn is_secure(&self) -> bool {
        match &self.state {
            SessionState::Authorization(client) => client.is_secure(),
            SessionState::Transaction(client) => client.is_secure(),
            SessionState::Closed => false,
        }
    }

    fn is_open(&self) -> bool {
        match &self.state {
            SessionState::Authorization(client) => client.is_open(),
            SessionState::Transaction(client) => client.is_open(),
            SessionState::Closed => false,
        }
    }

    async fn negotiate_security(&mut self, host: &str) -> Result<(), TransportError> {
        match &mut self.state {
            SessionState::Authorization(client) => client
                .stls(host)
                .await
                .map_err(|e| TransportError::SecurityUpgrade(e.to_string())),
            _ => Err(TransportError::SecurityUpgrade(
                "STLS is only valid before login".into(),
            )),
        }
    }

    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Authorization(client) => match client.login(identity, secret).await {
                Ok(client) => {
                    self.state = SessionState::Transaction(client);
                    Ok(())
                }
                Err(LoginError { error, client }) => {
                    self.state = SessionState::Authorization(client);
                    Err(TransportError::Authentication(error.to_string()))
                }
            },
            other => {
                self.state = other;
                Err(TransportError::Protocol("already authenticated".into()))
            }
        }
    }

    async fn mailbox_status(&mut self) -> Result<MailboxStat, TransportError> {
        self.transaction()?.stat().await.map_err(protocol)
    }

    async fn fetch_headers(&mut self, number: u32) -> Result<Vec<u8>, TransportError> {
        self.transaction()?.top(number, 0).await.map_err(protocol)
    }

    async fn fetch_full(&mut self, number: u32) -> Result<Vec<u8>, TransportError> {
        self.transaction()?.retr(number).await.map_err(protocol)
    }

    async fn close(self) -> Result<(), TransportError> {
        if !self.is_open() {
            return Ok(());
        }
        match self.state {
            SessionState::Authorization(client) => client.quit().await.map_err(protocol),
            SessionState::Transaction(client) => client.quit().await.map_err(protocol),
            SessionState::Closed => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Serves `greeting`, then answers each received line with the next reply.
    async fn scripted_server(
        greeting: &'static [u8],
        replies: Vec<&'static [u8]>,
    ) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut reader = BufReader::new(read_half);
            let mut received = Vec::new();

            write_half.write_all(greeting).await.unwrap();
            for reply in replies {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                received.push(line.trim_end().to_string());
                write_half.write_all(reply).await.unwrap();
            }
            received
        });

        (port, handle)
    }

    #[tokio::test]
    async fn test_session_over_plain_tcp() {
        let (port, server) = scripted_server(
            b"+OK ready\r\n",
            vec![
                b"-ERR STLS not supported\r\n",
                b"+OK\r\n",
                b"+OK\r\n",
                b"+OK 1 42\r\n",
                b"+OK\r\nSubject: hi\r\n\r\n.\r\n",
                b"+OK\r\nSubject: hi\r\n\r\nbody\r\n.\r\n",
                b"+OK bye\r\n",
            ],
        )
        .await;

        let transport = Pop3Transport::new(TIMEOUT);
        let mut session = transport
            .connect("127.0.0.1", port, Security::StartTls)
            .await
            .unwrap();
        assert!(!session.is_secure());
        assert!(session.is_open());

        let err = session.negotiate_security("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, TransportError::SecurityUpgrade(_)));

        session.authenticate("alice", "secret").await.unwrap();
        let stat = session.mailbox_status().await.unwrap();
        assert_eq!(stat.count, 1);
        assert_eq!(session.fetch_headers(1).await.unwrap(), b"Subject: hi\r\n\r\n");
        assert_eq!(
            session.fetch_full(1).await.unwrap(),
            b"Subject: hi\r\n\r\nbody\r\n"
        );
        session.close().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(
            received,
            vec!["STLS", "USER alice", "PASS secret", "STAT", "TOP 1 0", "RETR 1", "QUIT"]
        );
    }

    #[tokio::test]
    async fn test_rejected_login_still_closes() {
        let (port, server) = scripted_server(
            b"+OK ready\r\n",
            vec![b"+OK\r\n", b"-ERR invalid password\r\n", b"+OK bye\r\n"],
        )
        .await;

        let mut session = Pop3Transport::new(TIMEOUT)
            .connect("127.0.0.1", port, Security::StartTls)
            .await
            .unwrap();

        let err = session.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, TransportError::Authentication(_)));
        assert!(matches!(
            session.mailbox_status().await,
            Err(TransportError::Protocol(_))
        ));
        session.close().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.last().map(String::as_str), Some("QUIT"));
    }

    #[tokio::test]
    async fn test_stalled_fetch_closes_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut reader = BufReader::new(read_half);
            let mut received = Vec::new();

            write_half.write_all(b"+OK ready\r\n").await.unwrap();
            let replies: [&[u8]; 3] = [b"+OK\r\n", b"+OK\r\n", b"+OK\r\nSubject: one\r\n"];
            for reply in replies {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                received.push(line.trim_end().to_string());
                write_half.write_all(reply).await.unwrap();
            }
            // Everything after the stall is unread by the client
            let mut line = String::new();
            while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                received.push(line.trim_end().to_string());
                line.clear();
            }
            received
        });

        let mut session = Pop3Transport::new(Duration::from_millis(200))
            .connect("127.0.0.1", port, Security::StartTls)
            .await
            .unwrap();
        session.authenticate("alice", "secret").await.unwrap();

        let err = session.fetch_full(1).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
        assert!(!session.is_open());
        assert!(session.fetch_headers(2).await.is_err());
        session.close().await.unwrap();

        // No command reaches the server after the stalled RETR
        let received = server.await.unwrap();
        assert_eq!(received, vec!["USER alice", "PASS secret", "RETR 1"]);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Pop3Transport::new(TIMEOUT)
            .connect("127.0.0.1", port, Security::StartTls)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
