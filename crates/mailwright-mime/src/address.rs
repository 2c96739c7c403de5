//! Email address types.

use crate::encoding::encode_rfc2047;
use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Characters that may not appear unquoted in an addr-spec.
const SPECIALS: &str = "()<>[],;:\\\"";

/// Ordered list of addresses. Insertion order is preserved and duplicates
/// are allowed.
pub type AddressList = Vec<Address>;

/// Email address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    email: String,
    name: Option<String>,
}

impl Address {
    /// Creates a new address from a bare `local-part@domain` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is invalid.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        let email = email.trim().to_string();
        Self::validate(&email)?;
        Ok(Self { email, name: None })
    }

    /// Creates a new address with a display name.
    ///
    /// An empty display name is treated as no name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is invalid or the
    /// name contains control characters such as CR or LF.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let mut address = Self::new(email)?;
        let name = name.into();
        let name = name.trim();
        if name.contains(char::is_control) {
            return Err(Error::InvalidAddress(format!(
                "Display name contains control characters: {name:?}"
            )));
        }
        if !name.is_empty() {
            address.name = Some(name.to_string());
        }
        Ok(address)
    }

    /// Parses an address in one of the forms `user@host`,
    /// `Name <user@host>` or `"Quoted Name" <user@host>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the input cannot be parsed.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let Some(open) = input.rfind('<') else {
            return Self::new(input);
        };

        let rest = &input[open + 1..];
        let close = rest
            .find('>')
            .ok_or_else(|| Error::InvalidAddress(format!("Unterminated angle address: {input}")))?;
        if !rest[close + 1..].trim().is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Unexpected text after angle address: {input}"
            )));
        }

        let email = &rest[..close];
        let name = input[..open].trim();
        let name = name
            .strip_prefix('"')
            .and_then(|n| n.strip_suffix('"'))
            .unwrap_or(name)
            .replace("\\\"", "\"");

        Self::with_name(email, name)
    }

    /// Returns the bare `local-part@domain` address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map_or(self.email.as_str(), |(_, domain)| domain)
    }

    /// Renders the address for use in a header field.
    ///
    /// Display names containing specials are quoted; non-ASCII names are
    /// RFC 2047 encoded.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let Some(name) = &self.name else {
            return self.email.clone();
        };

        if !name.is_ascii() {
            return format!("{} <{}>", encode_rfc2047(name, "utf-8"), self.email);
        }

        if name.contains(|c: char| SPECIALS.contains(c) || c == '.' || c == '@') {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{}>", self.email)
        } else {
            format!("{name} <{}>", self.email)
        }
    }

    /// Validates a bare email address.
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        // SMTPUTF8 is never negotiated, so the envelope must stay ASCII
        if !addr.is_ascii() {
            return Err(Error::InvalidAddress(format!(
                "Address must be ASCII: {addr}"
            )));
        }

        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || SPECIALS.contains(c))
        {
            return Err(Error::InvalidAddress(format!(
                "Address contains illegal characters: {addr}"
            )));
        }

        let parts: Vec<&str> = addr.split('@').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidAddress(format!(
                "Address must have exactly one @: {addr}"
            )));
        }

        let (local, domain) = (parts[0], parts[1]);
        if local.is_empty() || domain.is_empty() {
            return Err(Error::InvalidAddress(format!(
                "Local and domain parts cannot be empty: {addr}"
            )));
        }

        if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
            return Err(Error::InvalidAddress(format!(
                "Misplaced dot in local part: {addr}"
            )));
        }

        if domain.split('.').any(str::is_empty) {
            return Err(Error::InvalidAddress(format!(
                "Empty domain label: {addr}"
            )));
        }

        Ok(())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// Joins an address list into a single header value.
#[must_use]
pub fn join_header_value(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(Address::to_header_value)
        .collect::<Vec<_>>()
        .join(", ")
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

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.email(), "user@example.com");
        assert!(addr.name().is_none());
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(matches!(
            Address::new("invalid-email"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
        assert!(Address::new("   ").is_err());
    }

    #[test]
    fn test_invalid_address_empty_parts() {
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_invalid_address_two_ats() {
        assert!(Address::new("a@b@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace_and_specials() {
        assert!(Address::new("us er@example.com").is_err());
        assert!(Address::new("user@exa<mple.com").is_err());
        assert!(Address::new("user@example..com").is_err());
        assert!(Address::new(".user@example.com").is_err());
    }

    #[test]
    fn test_with_name() {
        let addr = Address::with_name("reply@test.com", "Reply Person").unwrap();
        assert_eq!(addr.email(), "reply@test.com");
        assert_eq!(addr.name(), Some("Reply Person"));
        assert_eq!(addr.to_header_value(), "Reply Person <reply@test.com>");
    }

    #[test]
    fn test_with_empty_name() {
        let addr = Address::with_name("reply@test.com", "  ").unwrap();
        assert!(addr.name().is_none());
        assert_eq!(addr.to_header_value(), "reply@test.com");
    }

    #[test]
    fn test_parse_angle_forms() {
        let addr = Address::parse("John Doe <john@example.com>").unwrap();
        assert_eq!(addr.email(), "john@example.com");
        assert_eq!(addr.name(), Some("John Doe"));

        let addr = Address::parse("\"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(addr.name(), Some("Doe, John"));

        let addr = Address::parse("<john@example.com>").unwrap();
        assert!(addr.name().is_none());
    }

    #[test]
    fn test_parse_rejects_trailing_text() {
        assert!(Address::parse("John <john@example.com> extra").is_err());
        assert!(Address::parse("John <john@example.com").is_err());
    }

    #[test]
    fn test_header_value_quotes_specials() {
        let addr = Address::with_name("john@example.com", "Doe, John").unwrap();
        assert_eq!(addr.to_header_value(), "\"Doe, John\" <john@example.com>");
    }

    #[test]
    fn test_header_value_encodes_non_ascii() {
        let addr = Address::with_name("jose@example.com", "José").unwrap();
        assert!(addr.to_header_value().starts_with("=?utf-8?B?"));
        assert!(addr.to_header_value().ends_with(" <jose@example.com>"));
    }

    #[test]
    fn test_display_name_rejects_control_characters() {
        for name in ["Evil\r\nBcc: spy@evil.example", "Evil\nX: y", "Tab\tbed", "nul\0"] {
            assert!(matches!(
                Address::with_name("r@example.com", name),
                Err(Error::InvalidAddress(_))
            ));
        }
        assert!(Address::parse("\"Evil\r\nBcc: x@y.z\" <r@example.com>").is_err());
    }

    #[test]
    fn test_non_ascii_address_rejected() {
        assert!(matches!(
            Address::new("josé@example.com"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(Address::new("user@bücher.example").is_err());
        assert!(Address::with_name("user@example.com", "José").is_ok());
    }

    #[test]
    fn test_domain() {
        let addr = Address::new("user@mail.example.com").unwrap();
        assert_eq!(addr.domain(), "mail.example.com");
    }

    #[test]
    fn test_join_header_value() {
        let list = vec![
            Address::new("a@example.com").unwrap(),
            Address::with_name("b@example.com", "Bee").unwrap(),
        ];
        assert_eq!(join_header_value(&list), "a@example.com, Bee <b@example.com>");
    }
}
