//! `Content-Type` values for message bodies (RFC 2045 section 5).

use crate::error::{Error, Result};
use std::fmt;

/// Characters that may not appear in an RFC 2045 token.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

const CHARSET: &str = "charset";

/// A media type with its parameters, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a content type without parameters. Both parts are lowercased.
    #[must_use]
    pub fn new(media_type: &str, subtype: &str) -> Self {
        Self {
            media_type: media_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    /// `text/plain; charset=utf-8`, the body type used when none is set.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter(CHARSET, "utf-8")
    }

    /// Returns the top-level media type, such as `text`.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Returns the subtype, such as `plain`.
    #[must_use]
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    /// Returns true for `text/*`.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.media_type == "text"
    }

    /// Looks up a parameter by case-insensitive name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets a parameter, replacing any existing value of the same name.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .params
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value,
            None => self.params.push((name.to_ascii_lowercase(), value)),
        }
    }

    /// Builder form of [`ContentType::set_parameter`].
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Returns the `charset` parameter.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameter(CHARSET)
    }

    /// Replaces the `charset` parameter.
    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.set_parameter(CHARSET, charset);
    }

    /// Parses `type/subtype` followed by `; name=value` parameters. Values
    /// may be quoted strings containing `;`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if the type or a parameter is
    /// malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidContentType(format!("{reason}: {input:?}"));

        let (essence, mut rest) = input.split_once(';').unwrap_or((input, ""));
        let (media_type, subtype) = essence
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("missing subtype"))?;
        if !is_token(media_type) || !is_token(subtype) {
            return Err(invalid("malformed media type"));
        }

        let mut content_type = Self::new(media_type, subtype);
        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }

            let (name, after_name) = rest
                .split_once('=')
                .ok_or_else(|| invalid("parameter without value"))?;
            let name = name.trim();
            if !is_token(name) {
                return Err(invalid("malformed parameter name"));
            }

            let after_name = after_name.trim_start();
            let (value, remainder) = if let Some(quoted) = after_name.strip_prefix('"') {
                take_quoted(quoted).ok_or_else(|| invalid("unterminated quoted string"))?
            } else {
                let end = after_name.find(';').unwrap_or(after_name.len());
                (after_name[..end].trim_end().to_string(), &after_name[end..])
            };

            content_type.set_parameter(name, value);
            rest = remainder;
        }

        Ok(content_type)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_graphic() && !TSPECIALS.contains(c))
}

/// Reads a quoted string body (opening quote already consumed), returning
/// the unescaped value and the text after the closing quote.
fn take_quoted(s: &str) -> Option<(String, &str)> {
    let mut value = String::new();
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((value, &s[i + 1..])),
            '\\' => value.push(chars.next()?.1),
            _ => value.push(c),
        }
    }
    None
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.media_type, self.subtype)?;
        for (name, value) in &self.params {
            if is_token(value) {
                write!(f, "; {name}={value}")?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {name}=\"{escaped}\"")?;
            }
        }
        Ok(())
    }
}
