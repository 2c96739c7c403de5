//! # mailwright-mime
//!
//! Drafting and rendering of outgoing email messages.
//!
//! ## Features
//!
//! - **Drafts**: accumulate sender, To/Cc/Bcc/Reply-To lists, subject, body
//!   and custom headers with validation at every call
//! - **One-shot build**: a [`Draft`] turns into an immutable [`Message`]
//!   exactly once
//! - **Wire format**: RFC 5322 headers, 7bit or Quoted-Printable bodies,
//!   RFC 2047 encoded subjects and display names
//! - **Envelope**: every built message carries the SMTP sender and recipients
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailwright_mime::Draft;
//!
//! let mut draft = Draft::new();
//! draft
//!     .set_from("sender@example.com")?
//!     .add_to(["recipient@example.com"])?
//!     .add_header("X-Priority", "1")?
//!     .set_subject("Test Subject")
//!     .set_msg("Hello, World!")?;
//!
//! let message = draft.build()?;
//! assert_eq!(message.content(), "Hello, World!");
//!
//! // A draft can only be built once.
//! assert!(draft.build().is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod draft;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::{Address, AddressList, join_header_value};
pub use content_type::ContentType;
pub use draft::Draft;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Envelope, Message, TransferEncoding, generate_message_id};
