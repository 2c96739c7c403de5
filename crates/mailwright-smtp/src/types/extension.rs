//! Service extensions advertised in the EHLO reply (RFC 5321 section 4.1.1.1).

use std::fmt;
use std::str::FromStr;

/// One capability line from an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// `STARTTLS` (RFC 3207)
    StartTls,
    /// `AUTH` with the mechanisms this client understands (RFC 4954).
    Auth(Vec<AuthMechanism>),
    /// `SIZE`, with the optional limit in bytes (RFC 1870).
    Size(Option<usize>),
    /// `8BITMIME`
    EightBitMime,
    /// `PIPELINING`
    Pipelining,
    /// `SMTPUTF8`
    SmtpUtf8,
    /// Any other keyword, uppercased.
    Other(String),
}

impl Extension {
    /// Parses a capability line such as `SIZE 1000000`.
    ///
    /// The pre-standard `AUTH=PLAIN LOGIN` spelling is accepted as `AUTH`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let first = words.next().unwrap_or_default();
        let (keyword, inline_arg) = match first.split_once('=') {
            Some((keyword, arg)) => (keyword.to_ascii_uppercase(), Some(arg)),
            None => (first.to_ascii_uppercase(), None),
        };

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(
                inline_arg
                    .into_iter()
                    .chain(words)
                    .filter_map(|name| name.parse().ok())
                    .collect(),
            ),
            "SIZE" => Self::Size(words.next().and_then(|limit| limit.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "SMTPUTF8" => Self::SmtpUtf8,
            _ => Self::Other(keyword),
        }
    }
}

/// SASL mechanism named in an `AUTH` capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// `PLAIN` (RFC 4616)
    Plain,
    /// `LOGIN`
    Login,
    /// `CRAM-MD5`
    CramMd5,
    /// `XOAUTH2`
    XOAuth2,
}

impl AuthMechanism {
    /// Returns the registered mechanism name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }
}

impl FromStr for AuthMechanism {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        [Self::Plain, Self::Login, Self::CramMd5, Self::XOAuth2]
            .into_iter()
            .find(|mechanism| mechanism.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| name.to_string())
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
