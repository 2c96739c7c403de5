//! Client commands and their wire form.

use crate::types::AuthMechanism;
use mailwright_mime::Address;
use std::fmt;

/// A command sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `HELO`, the pre-ESMTP greeting.
    Helo {
        /// Client hostname.
        hostname: String,
    },
    /// `EHLO`, the extended greeting.
    Ehlo {
        /// Client hostname.
        hostname: String,
    },
    /// `STARTTLS`
    StartTls,
    /// `AUTH`, optionally with a SASL initial response.
    Auth {
        /// Mechanism.
        mechanism: AuthMechanism,
        /// Base64 initial response.
        initial_response: Option<String>,
    },
    /// `MAIL FROM`
    MailFrom {
        /// Envelope sender. Only the bare address is sent.
        from: Address,
        /// `SIZE=` parameter.
        size: Option<usize>,
    },
    /// `RCPT TO`
    RcptTo {
        /// Envelope recipient. Only the bare address is sent.
        to: Address,
    },
    /// `DATA`
    Data,
    /// `RSET`
    Rset,
    /// `QUIT`
    Quit,
}

impl Command {
    /// Returns the verb, for logging without arguments.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }

    /// Returns the CRLF-terminated bytes to write.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        format!("{self}\r\n").into_bytes()
    }
}

/// Renders the command line without its CRLF terminator.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } | Self::Ehlo { hostname } => {
                write!(f, "{} {hostname}", self.verb())
            }
            Self::Auth {
                mechanism,
                initial_response,
            } => {
                write!(f, "AUTH {}", mechanism.as_str())?;
                match initial_response {
                    Some(response) => write!(f, " {response}"),
                    None => Ok(()),
                }
            }
            Self::MailFrom { from, size } => {
                write!(f, "MAIL FROM:<{}>", from.email())?;
                match size {
                    Some(size) => write!(f, " SIZE={size}"),
                    None => Ok(()),
                }
            }
            Self::RcptTo { to } => write!(f, "RCPT TO:<{}>", to.email()),
            Self::StartTls | Self::Data | Self::Rset | Self::Quit => f.write_str(self.verb()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(email: &str) -> Address {
        Address::new(email).unwrap()
    }

    #[test]
    fn test_greetings() {
        let hostname = "client.example.com".to_string();
        assert_eq!(
            Command::Helo {
                hostname: hostname.clone()
            }
            .to_string(),
            "HELO client.example.com"
        );
        assert_eq!(
            Command::Ehlo { hostname }.serialize(),
            b"EHLO client.example.com\r\n"
        );
    }

    #[test]
    fn test_auth() {
        let with_response = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(with_response.to_string(), "AUTH PLAIN AHVzZXIAcGFzcw==");

        let bare = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        assert_eq!(bare.to_string(), "AUTH LOGIN");
        assert_eq!(bare.verb(), "AUTH");
    }

    #[test]
    fn test_envelope_commands_use_bare_address() {
        let from = Command::MailFrom {
            from: Address::with_name("sender@example.com", "Sender Name").unwrap(),
            size: None,
        };
        assert_eq!(from.to_string(), "MAIL FROM:<sender@example.com>");

        let sized = Command::MailFrom {
            from: addr("sender@example.com"),
            size: Some(12_345),
        };
        assert_eq!(sized.to_string(), "MAIL FROM:<sender@example.com> SIZE=12345");

        let rcpt = Command::RcptTo {
            to: addr("recipient@example.com"),
        };
        assert_eq!(rcpt.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_bare_verbs() {
        for (cmd, wire) in [
            (Command::StartTls, "STARTTLS"),
            (Command::Data, "DATA"),
            (Command::Rset, "RSET"),
            (Command::Quit, "QUIT"),
        ] {
            assert_eq!(cmd.to_string(), wire);
        }
    }
}
