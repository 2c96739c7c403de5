//! # mailwright
//!
//! Compose an email and send it over SMTP through one object.
//!
//! [`Email`] pairs a [`Draft`](mailwright_mime::Draft) with a
//! [`SessionDispatcher`](mailwright_smtp::SessionDispatcher): builder calls
//! shape the message, transport calls shape the session, and
//! [`Email::send`] builds the message once and delivers it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailwright::Email;
//! use std::time::Duration;
//!
//! # async fn run() -> mailwright::Result<()> {
//! let mut email = Email::new();
//! email
//!     .set_host_name("smtp.example.com")
//!     .set_ssl_on_connect(true)
//!     .set_socket_timeout(Duration::from_secs(10))
//!     .set_authentication("user", "secret");
//! email
//!     .set_from("sender@example.com")?
//!     .add_to(["recipient@example.com"])?
//!     .set_subject("Hello")
//!     .set_msg("Hello, World!")?;
//!
//! let message_id = email.send().await?;
//! println!("sent {message_id}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod email;
mod error;

pub use email::Email;
pub use error::{Error, Result};

pub use mailwright_mime as mime;
pub use mailwright_smtp as smtp;
