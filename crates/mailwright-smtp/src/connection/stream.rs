//! Low-level SMTP stream handling.

use crate::config::{Security, TransportConfig};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore},
};

/// Longest reply line accepted from the server, CRLF included.
pub const MAX_REPLY_LINE: usize = 1000;

#[derive(Debug)]
enum Transport {
    Tcp(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
}

/// SMTP stream (TCP or TLS) with a per-operation I/O timeout.
///
/// A zero timeout disables the limit.
#[derive(Debug)]
pub struct SmtpStream {
    transport: Transport,
    io_timeout: Duration,
}

impl SmtpStream {
    /// Wraps a connected TCP stream.
    #[must_use]
    pub fn from_tcp(stream: TcpStream, io_timeout: Duration) -> Self {
        Self {
            transport: Transport::Tcp(BufReader::new(stream)),
            io_timeout,
        }
    }

    /// Returns true if the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls(_))
    }

    /// Returns the per-operation I/O limit.
    #[must_use]
    pub const fn io_timeout(&self) -> Duration {
        self.io_timeout
    }

    /// Reads a line from the stream, without the line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no line arrives in time,
    /// [`Error::Protocol`] if the line is longer than [`MAX_REPLY_LINE`] or
    /// not UTF-8, or an I/O error if the read fails or the server closed the
    /// connection.
    pub async fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let read = match &mut self.transport {
            Transport::Tcp(reader) => {
                bounded(self.io_timeout, "reading reply", read_capped(reader, &mut line)).await?
            }
            Transport::Tls(reader) => {
                bounded(
                    self.io_timeout,
                    "reading reply",
                    read_capped(reader.as_mut(), &mut line),
                )
                .await?
            }
        };
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        if read >= MAX_REPLY_LINE && !line.ends_with(b"\n") {
            return Err(Error::Protocol(format!(
                "Reply line longer than {MAX_REPLY_LINE} octets"
            )));
        }

        let line = String::from_utf8(line)
            .map_err(|_| Error::Protocol("Reply line is not valid UTF-8".into()))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Writes data to the stream and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the write stalls, or an I/O error if it
    /// fails.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.io_timeout;
        match &mut self.transport {
            Transport::Tcp(reader) => {
                let stream = reader.get_mut();
                bounded(timeout, "writing", async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
            Transport::Tls(reader) => {
                let stream = reader.get_mut();
                bounded(timeout, "writing", async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await
            }
        }
    }

    /// Upgrades a TCP stream to TLS.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is already encrypted or the TLS
    /// handshake fails.
    pub async fn upgrade_to_tls(self, hostname: &str) -> Result<Self> {
        let tcp_stream = match self.transport {
            Transport::Tcp(reader) => reader.into_inner(),
            Transport::Tls(_) => return Err(Error::Protocol("Already using TLS".into())),
        };

        let tls_stream = handshake(hostname, tcp_stream, self.io_timeout).await?;
        Ok(Self {
            transport: Transport::Tls(Box::new(BufReader::new(tls_stream))),
            io_timeout: self.io_timeout,
        })
    }
}

/// Opens a stream as described by `config`.
///
/// The TCP connect and, for implicit TLS, the handshake are bounded by the
/// connect timeout.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails or times out.
pub async fn connect(config: &TransportConfig) -> Result<SmtpStream> {
    let tcp_stream = bounded(
        config.connect_timeout,
        "connecting",
        TcpStream::connect((config.host.as_str(), config.port)),
    )
    .await?;

    match config.security {
        Security::Implicit => {
            let tls_stream = handshake(&config.host, tcp_stream, config.connect_timeout).await?;
            Ok(SmtpStream {
                transport: Transport::Tls(Box::new(BufReader::new(tls_stream))),
                io_timeout: config.io_timeout,
            })
        }
        Security::None | Security::StartTls => {
            Ok(SmtpStream::from_tcp(tcp_stream, config.io_timeout))
        }
    }
}

async fn handshake(
    hostname: &str,
    tcp_stream: TcpStream,
    timeout: Duration,
) -> Result<TlsStream<TcpStream>> {
    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::Protocol(format!("Invalid hostname: {hostname}")))?;

    bounded(
        timeout,
        "negotiating TLS",
        connector.connect(server_name, tcp_stream),
    )
    .await
}

/// Reads up to the next `\n`, stopping after [`MAX_REPLY_LINE`] octets.
async fn read_capped<R>(reader: R, line: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.take(MAX_REPLY_LINE as u64).read_until(b'\n', line).await
}

async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    if limit.is_zero() {
        return Ok(fut.await?);
    }
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout {
            operation,
            after: limit,
        }),
    }
}

/// Creates a TLS connector with the webpki root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn pair(io_timeout: Duration) -> (SmtpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (SmtpStream::from_tcp(client, io_timeout), server)
    }

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        server.write_all(b"220 ready\r\n250 OK\r\n").await.unwrap();

        assert_eq!(stream.read_line().await.unwrap(), "220 ready");
        assert_eq!(stream.read_line().await.unwrap(), "250 OK");
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_read_line_eof_is_error() {
        let (mut stream, server) = pair(Duration::from_secs(5)).await;
        drop(server);

        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_read_line_times_out() {
        let (mut stream, _server) = pair(Duration::from_millis(50)).await;

        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: "reading reply",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_line_rejects_overlong_line() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        let long = format!("250 {}\r\n", "x".repeat(MAX_REPLY_LINE));
        server.write_all(long.as_bytes()).await.unwrap();

        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("longer than")));
    }

    #[tokio::test]
    async fn test_read_line_accepts_line_at_limit() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        let text = format!("250 {}", "x".repeat(MAX_REPLY_LINE - 6));
        server.write_all(format!("{text}\r\n").as_bytes()).await.unwrap();

        assert_eq!(stream.read_line().await.unwrap(), text);
    }

    #[tokio::test]
    async fn test_read_line_rejects_invalid_utf8() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        server.write_all(b"250 \xff\xfe\r\n").await.unwrap();

        assert!(matches!(stream.read_line().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_write_all() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        stream.write_all(b"QUIT\r\n").await.unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"QUIT\r\n");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = TransportConfig::builder("127.0.0.1").port(port).build();
        let err = connect(&config).await.unwrap_err();
        assert!(err.is_transport());
    }
}
