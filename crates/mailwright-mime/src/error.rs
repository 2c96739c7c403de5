//! Error types for message drafting and generation.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Address could not be parsed as `local-part@domain`.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// An address list operation received no addresses.
    #[error("Address list cannot be empty")]
    EmptyInput,

    /// Header name or value is missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Message body is missing.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// No sender was set before building.
    #[error("From address required")]
    MissingSender,

    /// No To, Cc or Bcc recipient was set before building.
    #[error("At least one receiver address required")]
    MissingRecipient,

    /// The draft has already been built once.
    #[error("The message has already been built")]
    AlreadyBuilt,

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),
}

impl Error {
    /// Returns true if the error was raised while validating caller input,
    /// as opposed to while assembling the message.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress(_)
                | Self::EmptyInput
                | Self::InvalidArgument(_)
                | Self::InvalidMessage(_)
                | Self::InvalidContentType(_)
        )
    }
}
