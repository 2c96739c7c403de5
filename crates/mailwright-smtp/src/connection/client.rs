//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, RejectedRecipient, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailwright_mime::Address;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Greeted, no transaction open.
#[derive(Debug)]
pub struct Connected;

/// Logged in, no transaction open.
#[derive(Debug)]
pub struct Authenticated;

/// `MAIL FROM` accepted, no recipient yet.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one recipient accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// `DATA` accepted, waiting for the content.
#[derive(Debug)]
pub struct Data;

/// An SMTP session whose state parameter limits which commands may be sent.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

/// Access shared by every session state.
pub trait SmtpConnection {
    /// Returns what the server announced about itself.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

/// Result of offering a whole recipient list.
#[derive(Debug)]
pub enum RcptOutcome {
    /// Every recipient was accepted.
    Accepted(Client<RecipientAdded>),
    /// At least one recipient was refused. The transaction is still open.
    Rejected {
        /// Client, ready for `reset` or `quit`.
        client: Client<MailTransaction>,
        /// Every refused recipient with the server's reply.
        rejected: Vec<RejectedRecipient>,
    },
}

impl Client<Connected> {
    /// Waits for the 220 banner on a freshly opened stream.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a banner other than 2xx.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = read_reply(&mut stream).await?.ensure_success()?;

        // First word of the banner names the server
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        tracing::debug!(server = %hostname, "SMTP greeting received");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?
            .ensure_success()?;
        self.apply_extensions(&reply);
        Ok(self)
    }

    /// Sends HELO. No extensions are available afterwards.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn helo(mut self, client_hostname: &str) -> Result<Self> {
        self.send_command(Command::Helo {
            hostname: client_hostname.to_string(),
        })
        .await?
        .ensure_success()?;
        self.server_info.extensions.clear();
        Ok(self)
    }

    /// Sends EHLO, falling back to HELO if the server refuses EHLO with a
    /// permanent error.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn greet(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.apply_extensions(&reply);
            return Ok(self);
        }
        if !reply.is_permanent_error() {
            return Err(reply.into_error());
        }

        tracing::debug!(code = reply.code.as_u16(), "EHLO refused, falling back to HELO");
        self.helo(client_hostname).await
    }

    /// Negotiates TLS with STARTTLS, then greets again over the encrypted
    /// channel.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] if STARTTLS was not advertised, otherwise any
    /// reply, handshake or I/O failure.
    pub async fn starttls(mut self, server_hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.send_command(Command::StartTls)
            .await?
            .ensure_success()?;

        self.stream = self.stream.upgrade_to_tls(server_hostname).await?;
        tracing::debug!(server = server_hostname, "STARTTLS negotiated");

        self.ehlo(client_hostname).await
    }

    /// Logs in with SASL PLAIN, sending the credentials as the initial
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server does not offer AUTH
    /// PLAIN, or an SMTP error if authentication fails.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        if !self.server_info.supports_auth(AuthMechanism::Plain) {
            return Err(Error::NotSupported("AUTH PLAIN".into()));
        }

        let encoded = STANDARD.encode(format!("\0{username}\0{password}"));

        self.send_command(Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(encoded),
        })
        .await?
        .ensure_success()?;

        tracing::debug!(username, "authenticated");
        Ok(self.transition())
    }

    /// Opens an unauthenticated transaction with `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn mail_from(
        self,
        from: &Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_transaction(from, size).await
    }
}

impl Client<Authenticated> {
    /// Opens a transaction with `MAIL FROM`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn mail_from(
        self,
        from: &Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.start_transaction(from, size).await
    }
}

impl Client<MailTransaction> {
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Client<RecipientAdded>> {
        self.try_rcpt_to(to).await?.ensure_success()?;
        Ok(self.transition())
    }

    /// Sends RCPT TO and returns the server's reply, whatever its code.
    ///
    /// # Errors
    ///
    /// Returns an error only if the exchange itself fails.
    pub async fn try_rcpt_to(&mut self, to: &Address) -> Result<Reply> {
        let reply = self.send_command(Command::RcptTo { to: to.clone() }).await?;
        if !reply.is_success() {
            tracing::debug!(
                recipient = to.email(),
                code = reply.code.as_u16(),
                "recipient refused"
            );
        }
        Ok(reply)
    }

    /// Offers every recipient, collecting the refusals instead of stopping at
    /// the first one.
    ///
    /// # Errors
    ///
    /// Returns an error if `recipients` is empty or an exchange fails.
    pub async fn rcpt_to_all(mut self, recipients: &[Address]) -> Result<RcptOutcome> {
        if recipients.is_empty() {
            return Err(Error::Protocol("No recipients to offer".into()));
        }

        let mut rejected = Vec::new();
        for to in recipients {
            let reply = self.try_rcpt_to(to).await?;
            if !reply.is_success() {
                rejected.push(RejectedRecipient {
                    address: to.email().to_string(),
                    code: reply.code.as_u16(),
                    message: reply.message_text(),
                });
            }
        }

        if rejected.is_empty() {
            Ok(RcptOutcome::Accepted(self.transition()))
        } else {
            Ok(RcptOutcome::Rejected {
                client: self,
                rejected,
            })
        }
    }

    /// Abandons the transaction with `RSET`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn reset(self) -> Result<Client<Connected>> {
        self.rset().await
    }
}

impl Client<RecipientAdded> {
    /// Adds one more recipient.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn rcpt_to(mut self, to: &Address) -> Result<Self> {
        self.send_command(Command::RcptTo { to: to.clone() })
            .await?
            .ensure_success()?;
        Ok(self)
    }

    /// Asks to start the message content.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer DATA with 354.
    pub async fn data(mut self) -> Result<Client<Data>> {
        self.send_command(Command::Data)
            .await?
            .ensure_code(ReplyCode::START_DATA)?;
        Ok(self.transition())
    }

    /// Abandons the transaction with `RSET`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or a non-2xx reply.
    pub async fn reset(self) -> Result<Client<Connected>> {
        self.rset().await
    }
}

impl Client<Data> {
    /// Transmits the content with CRLF line endings, leading dots doubled
    /// and the `.` terminator appended, then waits for the server to accept
    /// it, which ends the transaction.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or if the server refuses the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let payload = dot_stuff(message);
        self.stream.write_all(&payload).await?;

        let reply = read_reply(&mut self.stream).await?.ensure_success()?;
        tracing::debug!(
            bytes = payload.len(),
            reply = %reply.message_text(),
            "message accepted"
        );

        Ok(self.transition())
    }
}

impl<S> Client<S> {
    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        tracing::trace!(command = cmd.verb(), "sending");
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    fn apply_extensions(&mut self, reply: &Reply) {
        // Line one is the server name, not an extension
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn start_transaction(
        mut self,
        from: &Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        self.send_command(Command::MailFrom {
            from: from.clone(),
            size,
        })
        .await?
        .ensure_success()?;
        Ok(self.transition())
    }

    async fn rset(mut self) -> Result<Client<Connected>> {
        self.send_command(Command::Rset).await?.ensure_success()?;
        Ok(self.transition())
    }

    /// Returns true once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    /// Ends the session from any state.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors or an unexpected reply.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.is_success() && reply.code != ReplyCode::CLOSING {
            return Err(reply.into_error());
        }

        Ok(())
    }
}

/// Reads one complete reply. The I/O limit covers the whole reply, so a
/// server trickling continuation lines cannot hold the session open.
async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let limit = stream.io_timeout();
    if limit.is_zero() {
        return read_reply_lines(stream).await;
    }
    tokio::time::timeout(limit, read_reply_lines(stream))
        .await
        .map_err(|_| Error::Timeout {
            operation: "reading reply",
            after: limit,
        })?
}

async fn read_reply_lines(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        if line.is_empty() {
            continue;
        }

        let is_last = is_last_reply_line(&line);
        lines.push(line);

        if is_last {
            break;
        }
    }

    parse_reply(&lines)
}

/// Normalizes line endings, dot-stuffs, and appends the `.` terminator.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let body = message.strip_suffix(b"\n").unwrap_or(message);

    if !message.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn pair(io_timeout: Duration) -> (SmtpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (SmtpStream::from_tcp(client, io_timeout), server)
    }

    #[tokio::test]
    async fn test_read_reply_joins_continuation_lines() {
        let (mut stream, mut server) = pair(Duration::from_secs(5)).await;
        server
            .write_all(b"250-mx.example.com\r\n250-SIZE 1000\r\n250 8BITMIME\r\n")
            .await
            .unwrap();

        let reply = read_reply(&mut stream).await.unwrap();
        assert!(reply.is_success());
        assert_eq!(reply.message, vec!["mx.example.com", "SIZE 1000", "8BITMIME"]);
    }

    #[tokio::test]
    async fn test_read_reply_deadline_covers_all_lines() {
        let limit = Duration::from_millis(300);
        let (mut stream, mut server) = pair(limit).await;
        let writer = tokio::spawn(async move {
            for _ in 0..40 {
                if server.write_all(b"250-still here\r\n").await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        });

        let err = read_reply(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Timeout {
                operation: "reading reply",
                after,
            } if after == limit
        ));
        writer.abort();
    }

    #[test]
    fn test_dot_stuff_normalizes_and_terminates() {
        assert_eq!(dot_stuff(b"a\nb\r\n"), b"a\r\nb\r\n.\r\n");
        assert_eq!(dot_stuff(b"no newline"), b"no newline\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_leading_dots() {
        assert_eq!(dot_stuff(b".hidden\r\n..\r\n"), b"..hidden\r\n...\r\n.\r\n");
    }

    #[test]
    fn test_dot_stuff_keeps_blank_lines() {
        assert_eq!(dot_stuff(b"H: v\r\n\r\nbody\r\n"), b"H: v\r\n\r\nbody\r\n.\r\n");
        assert_eq!(dot_stuff(b""), b".\r\n");
    }
}
