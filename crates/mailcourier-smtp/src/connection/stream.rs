//! Low-level SMTP stream handling.

use std::io;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::connection::tls::TlsOptions;
use crate::error::{Error, Result};

/// SMTP stream (TCP or TLS), line oriented, with bounded waits.
#[derive(Debug)]
pub enum SmtpStream {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<tokio_rustls::client::TlsStream<TcpStream>>>),
}

impl SmtpStream {
    /// Opens a plain TCP connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection fails or `deadline` elapses.
    pub async fn connect(hostname: &str, port: u16, deadline: Duration) -> Result<Self> {
        let addr = format!("{hostname}:{port}");
        let stream = timeout(deadline, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout(deadline, "connecting"))??;
        Ok(Self::Tcp(BufReader::new(stream)))
    }

    /// Opens a connection encrypted from the first byte (implicit TLS).
    ///
    /// # Errors
    ///
    /// Returns an error when the connection or handshake fails, or
    /// `deadline` elapses.
    pub async fn connect_tls(
        hostname: &str,
        port: u16,
        deadline: Duration,
        options: TlsOptions,
    ) -> Result<Self> {
        let addr = format!("{hostname}:{port}");
        let server_name = server_name_for(hostname)?;
        let handshake = async {
            let tcp = TcpStream::connect(&addr).await?;
            let connector = options.build_connector();
            let tls = connector.connect(server_name, tcp).await?;
            Ok::<_, Error>(Self::Tls(Box::new(BufReader::new(tls))))
        };
        timeout(deadline, handshake)
            .await
            .map_err(|_| Error::Timeout(deadline, "TLS handshake"))?
    }

    /// Upgrades a plaintext stream to TLS (STARTTLS).
    ///
    /// # Errors
    ///
    /// Returns an error when the stream is already encrypted, the handshake
    /// fails, or `deadline` elapses.
    pub async fn upgrade_to_tls(
        self,
        hostname: &str,
        deadline: Duration,
        options: TlsOptions,
    ) -> Result<Self> {
        let reader = match self {
            Self::Tcp(reader) => reader,
            Self::Tls(_) => return Err(Error::Config("connection is already encrypted".into())),
        };

        // nothing may be buffered here: the upgrade follows the server's
        // 220 to STARTTLS, which the caller has fully consumed
        let tcp = reader.into_inner();
        let server_name = server_name_for(hostname)?;
        let connector = options.build_connector();
        let tls = timeout(deadline, connector.connect(server_name, tcp))
            .await
            .map_err(|_| Error::Timeout(deadline, "TLS handshake"))??;
        Ok(Self::Tls(Box::new(BufReader::new(tls))))
    }

    /// Reads one line, waiting at most `deadline`. The trailing CRLF is
    /// stripped; other whitespace is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error when the read fails, the peer closed the
    /// connection, or `deadline` elapses.
    pub async fn read_line(&mut self, deadline: Duration) -> Result<String> {
        let mut line = String::new();
        let read = async {
            match self {
                Self::Tcp(reader) => reader.read_line(&mut line).await,
                Self::Tls(reader) => reader.read_line(&mut line).await,
            }
        };
        let read_bytes = timeout(deadline, read)
            .await
            .map_err(|_| Error::Timeout(deadline, "awaiting server response"))??;
        if read_bytes == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes all bytes and flushes, within `deadline`.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails or `deadline` elapses.
    pub async fn write_all(&mut self, data: &[u8], deadline: Duration) -> Result<()> {
        let write = async {
            match self {
                Self::Tcp(reader) => {
                    let stream = reader.get_mut();
                    stream.write_all(data).await?;
                    stream.flush().await
                }
                Self::Tls(reader) => {
                    let stream = reader.get_mut();
                    stream.write_all(data).await?;
                    stream.flush().await
                }
            }
        };
        timeout(deadline, write)
            .await
            .map_err(|_| Error::Timeout(deadline, "writing to server"))??;
        Ok(())
    }

    /// Checks whether a complete line is already readable, without consuming
    /// anything or blocking.
    pub async fn has_buffered_line(&mut self) -> bool {
        let probe = async {
            match self {
                Self::Tcp(reader) => reader.fill_buf().await,
                Self::Tls(reader) => reader.fill_buf().await,
            }
        };
        // fill_buf does not consume; a zero deadline turns this into a
        // single poll of whatever has already arrived
        match timeout(Duration::ZERO, probe).await {
            Ok(Ok(buffered)) => buffered.contains(&b'\n'),
            _ => false,
        }
    }

    /// Drains every complete line already buffered, for diagnostics.
    pub async fn drain_buffered_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while self.has_buffered_line().await {
            match self.read_line(Duration::from_millis(1)).await {
                Ok(line) => lines.push(line),
                Err(_) => break,
            }
        }
        lines
    }

    /// Shuts the transport down; close is best effort, errors are dropped.
    pub async fn shutdown(&mut self) {
        let _ = match self {
            Self::Tcp(reader) => reader.get_mut().shutdown().await,
            Self::Tls(reader) => reader.get_mut().shutdown().await,
        };
    }
}

fn server_name_for(hostname: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Config(format!("invalid hostname: {hostname}")))
}
