//! SMTP reply parser.
//!
//! A reply is one or more lines sharing a three-digit code. Every line but
//! the last has `-` after the code; the last has a space or nothing:
//!
//! ```text
//! 250-mx.example.com
//! 250-SIZE 1000000
//! 250 STARTTLS
//! ```

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// One parsed reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    /// Reply code.
    pub code: u16,
    /// False if another line of the same reply follows.
    pub last: bool,
    /// Text after the separator.
    pub text: &'a str,
}

impl<'a> ReplyLine<'a> {
    /// Parses a single line (without CRLF).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line does not start with three
    /// digits followed by a space, `-`, or end of line.
    pub fn parse(line: &'a str) -> Result<Self> {
        let malformed = || Error::Protocol(format!("Malformed reply line: {line:?}"));

        let digits = line.get(..3).ok_or_else(malformed)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let code = digits.parse::<u16>().map_err(|_| malformed())?;

        let (last, text) = match line.as_bytes().get(3) {
            None => (true, ""),
            Some(b' ') => (true, line.get(4..).unwrap_or_default()),
            Some(b'-') => (false, line.get(4..).unwrap_or_default()),
            Some(_) => return Err(malformed()),
        };

        Ok(Self { code, last, text })
    }
}

/// Assembles a [`Reply`] from its raw lines.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if there are no lines, a line is malformed,
/// the code changes between lines, or the lines do not end exactly at the
/// final one.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let (final_line, leading) = lines
        .split_last()
        .ok_or_else(|| Error::Protocol("Empty reply".into()))?;

    let last = ReplyLine::parse(final_line)?;
    if !last.last {
        return Err(Error::Protocol(format!("Reply is incomplete: {final_line:?}")));
    }
    let mut message = Vec::with_capacity(lines.len());
    for raw in leading {
        let line = ReplyLine::parse(raw)?;
        if line.last {
            return Err(Error::Protocol(format!("Reply ended early at {raw:?}")));
        }
        if line.code != last.code {
            return Err(Error::Protocol(format!(
                "Reply code changed from {} to {}",
                line.code, last.code
            )));
        }
        message.push(line.text.to_string());
    }
    message.push(last.text.to_string());

    Ok(Reply::new(ReplyCode::new(last.code), message))
}

/// Returns true if `line` ends its reply. Malformed lines count as final so
/// that [`parse_reply`] gets to report them.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    !matches!(ReplyLine::parse(line), Ok(ReplyLine { last: false, .. }))
}
