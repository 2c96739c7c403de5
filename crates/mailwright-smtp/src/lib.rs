//! # mailwright-smtp
//!
//! SMTP delivery for messages built with `mailwright-mime`.
//!
//! ## Features
//!
//! - **Session dispatcher**: derives host, port, TLS mode and timeouts from
//!   explicit settings with ambient [`SessionProperties`] as fallback
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Protocol support**: EHLO (with HELO fallback), STARTTLS, AUTH PLAIN,
//!   MAIL FROM, RCPT TO, DATA, RSET, QUIT
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Timeouts**: Every connect, read and write is bounded
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwright_mime::Draft;
//! use mailwright_smtp::SessionDispatcher;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut draft = Draft::new();
//! draft
//!     .set_from("sender@example.com")?
//!     .add_to(["recipient@example.com"])?
//!     .set_subject("Hello")
//!     .set_msg("Hello, World!")?;
//! let message = draft.build()?;
//!
//! let mut dispatcher = SessionDispatcher::new();
//! dispatcher
//!     .set_host_name("smtp.example.com")
//!     .set_smtp_port(587)
//!     .set_start_tls_enabled(true);
//! let message_id = dispatcher.send(&message).await?;
//! println!("sent {message_id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! The library uses the type-state pattern to enforce valid SMTP operations:
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_plain() ───→ Authenticated
//! └──────────────┘                            │
//!        │                                    │
//!        └─── mail_from() ───→ MailTransaction ←┘
//!                                   │
//!                 rcpt_to() / rcpt_to_all()
//!                                   ↓
//!                            RecipientAdded ─── data() ───→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Response parser
//! - [`types`]: Core SMTP types (extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod config;
pub mod connection;
mod dispatch;
mod error;
pub mod parser;
mod session;
pub mod types;

pub use config::{
    ConfigBuilder, Credentials, DEFAULT_CLIENT_HOSTNAME, DEFAULT_SMTP_PORT, DEFAULT_SSL_PORT,
    DEFAULT_TIMEOUT, Security, TransportConfig, TransportOptions,
};
pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RcptOutcome, RecipientAdded,
    ServerInfo, SmtpConnection,
};
pub use dispatch::{SessionDispatcher, SessionState};
pub use error::{Error, RejectedRecipient, Result};
pub use session::SessionProperties;
pub use types::{AuthMechanism, Extension, Reply, ReplyClass, ReplyCode};
