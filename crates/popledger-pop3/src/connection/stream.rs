//! Low-level POP3 stream handling.

use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// POP3 stream (TCP or TLS).
#[derive(Debug)]
pub enum Pop3Stream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
    /// Connection dropped; every further operation fails.
    Closed,
}

impl Pop3Stream {
    /// Reads one line, including its terminator.
    ///
    /// Lines are returned as raw bytes because message content is not
    /// guaranteed to be valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the peer closed the connection.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        let read = match self {
            Self::Tcp(reader) => reader.read_until(b'\n', &mut line).await?,
            Self::Tls(reader) => reader.read_until(b'\n', &mut line).await?,
            Self::Closed => return Err(Error::ConnectionClosed),
        };
        if read == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(line)
    }

    /// Writes data to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Tls(reader) => {
                reader.get_mut().write_all(data).await?;
                reader.get_mut().flush().await?;
            }
            Self::Closed => return Err(Error::ConnectionClosed),
        }
        Ok(())
    }

    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Returns true once the connection has been dropped.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Drops the underlying connection.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }

    /// Upgrades a TCP stream to TLS in place.
    ///
    /// A failed handshake leaves the stream [`Pop3Stream::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is not plain TCP or the TLS handshake fails.
    pub async fn upgrade_to_tls(&mut self, hostname: &str) -> Result<()> {
        let tcp_stream = match std::mem::replace(self, Self::Closed) {
            Self::Tcp(reader) => reader.into_inner(),
            tls @ Self::Tls(_) => {
                *self = tls;
                return Err(Error::Protocol("Already using TLS".into()));
            }
            Self::Closed => return Err(Error::ConnectionClosed),
        };

        let connector = create_tls_connector();
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

        let tls_stream = connector.connect(server_name, tcp_stream).await?;
        *self = Self::Tls(Box::new(BufReader::new(tls_stream)));
        Ok(())
    }
}

/// Connects to a POP3 server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails or does not complete within `timeout`.
pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<Pop3Stream> {
    let stream = open_tcp(hostname, port, timeout).await?;
    Ok(Pop3Stream::Tcp(BufReader::new(stream)))
}

/// Connects to a POP3 server over TLS (implicit TLS on port 995).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16, timeout: Duration) -> Result<Pop3Stream> {
    let tcp_stream = open_tcp(hostname, port, timeout).await?;

    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    let tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, tcp_stream))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    Ok(Pop3Stream::Tls(Box::new(BufReader::new(tls_stream))))
}

async fn open_tcp(hostname: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(timeout))??;
    Ok(stream)
}

/// Creates a TLS connector with the bundled web PKI roots.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
