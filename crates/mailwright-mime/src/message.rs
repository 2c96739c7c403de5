//! Built, ready-to-send messages.

use crate::address::Address;
use crate::content_type::ContentType;
use crate::encoding::decode_rfc2047;
use crate::header::Headers;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

/// Transfer encoding applied to the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// SMTP envelope derived from a message: who it is from and who gets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Reverse path for `MAIL FROM`.
    pub sender: Address,
    /// Forward paths for `RCPT TO`: To, then Cc, then Bcc.
    pub recipients: Vec<Address>,
}

/// An immutable message, produced once from a [`Draft`](crate::Draft).
#[derive(Debug, Clone)]
pub struct Message {
    pub(crate) headers: Headers,
    pub(crate) text: String,
    pub(crate) body: Vec<u8>,
    pub(crate) content_type: ContentType,
    pub(crate) transfer_encoding: TransferEncoding,
    pub(crate) sent_date: DateTime<Utc>,
    pub(crate) message_id: String,
    pub(crate) envelope: Envelope,
}

impl Message {
    /// Returns all header fields in render order.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Gets the first value of a header field.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Gets the decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers
            .get("subject")
            .map(|s| decode_rfc2047(s).unwrap_or_else(|_| s.to_string()))
    }

    /// Returns the date the message was stamped with at build time.
    #[must_use]
    pub const fn sent_date(&self) -> DateTime<Utc> {
        self.sent_date
    }

    /// Returns the Message-ID, including angle brackets.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the body content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Returns the body transfer encoding.
    #[must_use]
    pub const fn transfer_encoding(&self) -> TransferEncoding {
        self.transfer_encoding
    }

    /// Returns the SMTP envelope.
    #[must_use]
    pub const fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Returns the encoded body as it goes on the wire.
    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body text exactly as it was given to the draft, line
    /// endings included. [`Message::raw_body`] holds the wire form.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.text
    }

    /// Renders the complete RFC 5322 message.
    #[must_use]
    pub fn formatted(&self) -> Vec<u8> {
        let headers = self.headers.to_string();
        let mut out = Vec::with_capacity(headers.len() + 2 + self.body.len());
        out.extend_from_slice(headers.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Generates a Message-ID of the form `<timestamp.random@domain>`.
#[must_use]
pub fn generate_message_id(domain: &str, now: DateTime<Utc>) -> String {
    let nonce: u64 = rand::thread_rng().r#gen();
    format!(
        "<{}.{nonce:016x}@{domain}>",
        now.timestamp_millis()
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn message(text: &str, body: &[u8], transfer_encoding: TransferEncoding) -> Message {
        let sender = Address::new("sender@example.com").unwrap();
        let mut headers = Headers::new();
        headers.add("From", sender.to_header_value());
        headers.add("Subject", "=?utf-8?B?SMOpbGxv?=");
        Message {
            headers,
            text: text.to_string(),
            body: body.to_vec(),
            content_type: ContentType::text_plain(),
            transfer_encoding,
            sent_date: Utc::now(),
            message_id: "<1.abc@example.com>".to_string(),
            envelope: Envelope {
                sender: sender.clone(),
                recipients: vec![sender],
            },
        }
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::parse("Quoted-Printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_content_is_source_text() {
        let msg = message("Héllo\nthere", b"H=C3=A9llo\r\nthere", TransferEncoding::QuotedPrintable);
        assert_eq!(msg.content(), "Héllo\nthere");
        assert_eq!(msg.raw_body(), b"H=C3=A9llo\r\nthere");
    }

    #[test]
    fn test_subject_is_decoded() {
        let msg = message("", b"", TransferEncoding::SevenBit);
        assert_eq!(msg.subject().as_deref(), Some("Héllo"));
    }

    #[test]
    fn test_formatted_separates_headers_and_body() {
        let msg = message("Body", b"Body", TransferEncoding::SevenBit);
        let formatted = String::from_utf8(msg.formatted()).unwrap();
        assert!(formatted.starts_with("From: sender@example.com\r\n"));
        assert!(formatted.ends_with("\r\n\r\nBody"));
    }

    #[test]
    fn test_generate_message_id() {
        let id = generate_message_id("example.com", Utc::now());
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert_ne!(id, generate_message_id("example.com", Utc::now()));
    }
}
