//! Error types for SMTP operations.

use std::fmt;
use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A recipient the server refused during `RCPT TO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecipient {
    /// Recipient address.
    pub address: String,
    /// Reply code (e.g., 550).
    pub code: u16,
    /// Reply text from server.
    pub message: String,
}

impl fmt::Display for RejectedRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.address, self.code, self.message)
    }
}

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Connecting or waiting for the server took too long.
    #[error("Timed out after {after:?} while {operation}")]
    Timeout {
        /// What was in progress.
        operation: &'static str,
        /// Configured limit.
        after: Duration,
    },

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// No SMTP host was configured, explicitly or through session properties.
    #[error("Cannot find valid hostname for mail session")]
    MissingHost,

    /// Invalid session configuration value.
    #[error("Invalid configuration for {key}: {value}")]
    InvalidConfig {
        /// Property key.
        key: String,
        /// Offending value.
        value: String,
    },

    /// The server refused one or more recipients; nothing was delivered.
    #[error("Recipients rejected: {}", format_rejected(.rejected))]
    Delivery {
        /// Every refused recipient with the server's reply.
        rejected: Vec<RejectedRecipient>,
    },

    /// The message exceeds the size limit advertised by the server.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Formatted message size.
        size: usize,
        /// Limit from the SIZE extension.
        limit: usize,
    },

    /// Message could not be prepared.
    #[error("Message error: {0}")]
    Message(#[from] mailwright_mime::Error),
}

fn format_rejected(rejected: &[RejectedRecipient]) -> String {
    rejected
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }

    /// Returns true if the connection or handshake failed, as opposed to a
    /// configuration mistake or a server-side rejection.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Timeout { .. }
                | Self::Protocol(_)
                | Self::NotSupported(_)
        )
    }

    /// Returns true if the error comes from local configuration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingHost | Self::InvalidConfig { .. } | Self::Message(_)
        )
    }

    /// Returns the rejected recipients of a [`Error::Delivery`] failure.
    #[must_use]
    pub fn rejected_recipients(&self) -> &[RejectedRecipient] {
        match self {
            Self::Delivery { rejected } => rejected,
            _ => &[],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let io = Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(io.is_transport());
        assert!(!io.is_configuration());

        let timeout = Error::Timeout {
            operation: "connecting",
            after: Duration::from_secs(1),
        };
        assert!(timeout.is_transport());

        assert!(Error::MissingHost.is_configuration());
        assert!(!Error::MissingHost.is_transport());

        assert!(Error::smtp_error(550, "no").is_permanent());
        assert!(Error::smtp_error(451, "later").is_transient());

        let too_large = Error::MessageTooLarge {
            size: 2048,
            limit: 1024,
        };
        assert!(!too_large.is_transport());
        assert_eq!(
            too_large.to_string(),
            "Message of 2048 bytes exceeds server limit of 1024 bytes"
        );
    }

    #[test]
    fn test_delivery_lists_rejections() {
        let err = Error::Delivery {
            rejected: vec![
                RejectedRecipient {
                    address: "a@example.com".into(),
                    code: 550,
                    message: "No such user".into(),
                },
                RejectedRecipient {
                    address: "b@example.com".into(),
                    code: 452,
                    message: "Mailbox full".into(),
                },
            ],
        };
        assert_eq!(err.rejected_recipients().len(), 2);
        assert_eq!(
            err.to_string(),
            "Recipients rejected: a@example.com (550 No such user), b@example.com (452 Mailbox full)"
        );
        assert!(Error::MissingHost.rejected_recipients().is_empty());
    }
}
