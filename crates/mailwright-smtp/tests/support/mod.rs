//! In-process mock SMTP server.
//!
//! Listens on an ephemeral localhost port, speaks enough SMTP for the client
//! to complete a transaction, and records every envelope and message it
//! accepts.
#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A message accepted after `DATA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Envelope sender.
    pub sender: String,
    /// Accepted envelope recipients.
    pub recipients: Vec<String>,
    /// Message data with dot-stuffing removed, CRLF line endings.
    pub data: String,
}

#[derive(Debug, Default)]
struct Recorded {
    commands: Vec<String>,
    messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Clone)]
struct Behavior {
    capabilities: Vec<String>,
    reject_ehlo: bool,
    silent: bool,
    rejections: HashMap<String, (u16, String)>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            capabilities: vec!["PIPELINING".into(), "8BITMIME".into()],
            reject_ehlo: false,
            silent: false,
            rejections: HashMap::new(),
        }
    }
}

/// Configures a [`MockSmtpServer`].
#[derive(Debug, Default)]
pub struct MockSmtpServerBuilder {
    behavior: Behavior,
}

impl MockSmtpServerBuilder {
    /// Replaces the EHLO capability lines.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.behavior.capabilities = capabilities.iter().map(ToString::to_string).collect();
        self
    }

    /// Answers EHLO with `502` so the client must fall back to HELO.
    #[must_use]
    pub const fn rejecting_ehlo(mut self) -> Self {
        self.behavior.reject_ehlo = true;
        self
    }

    /// Accepts connections but never sends a greeting.
    #[must_use]
    pub const fn silent(mut self) -> Self {
        self.behavior.silent = true;
        self
    }

    /// Refuses `RCPT TO` for `address` with the given reply.
    #[must_use]
    pub fn rejecting_recipient(mut self, address: &str, code: u16, text: &str) -> Self {
        self.behavior
            .rejections
            .insert(address.to_ascii_lowercase(), (code, text.to_string()));
        self
    }

    /// Binds `127.0.0.1:0` and starts accepting connections.
    pub async fn start(self) -> MockSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let behavior = Arc::new(self.behavior);

        let accept_recorded = Arc::clone(&recorded);
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let recorded = Arc::clone(&accept_recorded);
                let behavior = Arc::clone(&behavior);
                tokio::spawn(async move {
                    let _ = serve(socket, &behavior, &recorded).await;
                });
            }
        });

        MockSmtpServer {
            addr,
            recorded,
            handle,
        }
    }
}

/// Mock SMTP server handle. The listener stops when the handle is dropped.
#[derive(Debug)]
pub struct MockSmtpServer {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    handle: JoinHandle<()>,
}

impl MockSmtpServer {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::default()
    }

    /// Starts a server with default behavior.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// Returns the listening port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns true if a message was delivered to `recipient`.
    #[must_use]
    pub fn has_received_message(&self, recipient: &str) -> bool {
        self.messages().iter().any(|m| {
            m.recipients
                .iter()
                .any(|r| r.eq_ignore_ascii_case(recipient))
        })
    }

    /// Returns every accepted message.
    #[must_use]
    pub fn messages(&self) -> Vec<ReceivedMessage> {
        self.recorded.lock().unwrap().messages.clone()
    }

    /// Returns the verbs of every command received, in order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.recorded.lock().unwrap().commands.clone()
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn angle_address(arg: &str) -> String {
    let start = arg.find('<').map_or(0, |i| i + 1);
    let end = arg.rfind('>').unwrap_or(arg.len());
    arg.get(start..end).unwrap_or_default().to_string()
}

async fn serve(
    socket: TcpStream,
    behavior: &Behavior,
    recorded: &Mutex<Recorded>,
) -> std::io::Result<()> {
    let (read_half, mut writer) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    if behavior.silent {
        // Hold the connection open without ever greeting
        let mut sink = String::new();
        while reader.read_line(&mut sink).await? > 0 {
            sink.clear();
        }
        return Ok(());
    }

    writer.write_all(b"220 mock.local ESMTP ready\r\n").await?;

    let mut sender = String::new();
    let mut recipients: Vec<String> = Vec::new();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        let upper = command.to_ascii_uppercase();
        let verb = upper
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .to_string();
        recorded.lock().unwrap().commands.push(verb.clone());

        match verb.as_str() {
            "EHLO" if behavior.reject_ehlo => {
                writer.write_all(b"502 Command not implemented\r\n").await?;
            }
            "EHLO" => {
                let lines: Vec<&str> = std::iter::once("mock.local")
                    .chain(behavior.capabilities.iter().map(String::as_str))
                    .collect();
                let mut reply = String::new();
                for (i, text) in lines.iter().enumerate() {
                    let sep = if i + 1 == lines.len() { ' ' } else { '-' };
                    reply.push_str(&format!("250{sep}{text}\r\n"));
                }
                writer.write_all(reply.as_bytes()).await?;
            }
            "HELO" => writer.write_all(b"250 mock.local\r\n").await?,
            "AUTH" => {
                writer
                    .write_all(b"235 2.7.0 Authentication successful\r\n")
                    .await?;
            }
            "STARTTLS" => writer.write_all(b"454 TLS not available\r\n").await?,
            "MAIL" => {
                sender = angle_address(&command);
                recipients.clear();
                writer.write_all(b"250 OK\r\n").await?;
            }
            "RCPT" => {
                let address = angle_address(&command);
                if let Some((code, text)) = behavior.rejections.get(&address.to_ascii_lowercase()) {
                    writer
                        .write_all(format!("{code} {text}\r\n").as_bytes())
                        .await?;
                } else {
                    recipients.push(address);
                    writer.write_all(b"250 OK\r\n").await?;
                }
            }
            "DATA" => {
                writer
                    .write_all(b"354 End data with <CR><LF>.<CR><LF>\r\n")
                    .await?;
                let mut data = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    let text = line.trim_end_matches(['\r', '\n']);
                    if text == "." {
                        break;
                    }
                    let text = text.strip_prefix('.').unwrap_or(text);
                    data.push_str(text);
                    data.push_str("\r\n");
                }
                recorded.lock().unwrap().messages.push(ReceivedMessage {
                    sender: std::mem::take(&mut sender),
                    recipients: std::mem::take(&mut recipients),
                    data,
                });
                writer.write_all(b"250 OK: queued\r\n").await?;
            }
            "RSET" => {
                sender.clear();
                recipients.clear();
                writer.write_all(b"250 OK\r\n").await?;
            }
            "QUIT" => {
                writer.write_all(b"221 Bye\r\n").await?;
                return Ok(());
            }
            _ => writer.write_all(b"500 Unrecognized command\r\n").await?,
        }
    }
}
