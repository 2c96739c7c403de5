//! Error types for composing and sending.

use thiserror::Error;

/// Errors from building or sending an [`Email`](crate::Email).
#[derive(Debug, Error)]
pub enum Error {
    /// The draft was rejected.
    #[error(transparent)]
    Mime(#[from] mailwright_mime::Error),

    /// Session configuration or delivery failed.
    #[error(transparent)]
    Smtp(#[from] mailwright_smtp::Error),

    /// A send was requested before the message was built.
    #[error("Message has not been built")]
    NotBuilt,
}

impl Error {
    /// Returns true if the connection or handshake failed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Smtp(e) if e.is_transport())
    }

    /// Returns true if the error comes from the caller's input or settings
    /// rather than from the network or the server.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        match self {
            Self::Mime(_) | Self::NotBuilt => true,
            Self::Smtp(e) => e.is_configuration(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
