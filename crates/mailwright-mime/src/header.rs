//! Header fields of an outgoing message.

use crate::error::{Error, Result};
use std::fmt;

/// Rendered lines longer than this are folded at whitespace (RFC 5322
/// section 2.1.1).
const FOLD_WIDTH: usize = 78;

/// Ordered header fields with case-insensitive lookup.
///
/// Names keep the spelling they were added with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields, counting repeated names separately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Replaces every field called `name` with a single one, placed where
    /// the first of them was. Appends if there was none.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let field = (name.into(), value.into());
        let Some(first) = self.position(&field.0) else {
            self.fields.push(field);
            return;
        };

        let mut index = 0;
        self.fields.retain(|(existing, _)| {
            let keep = index <= first || !existing.eq_ignore_ascii_case(&field.0);
            index += 1;
            keep
        });
        self.fields[first] = field;
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.fields[i].1.as_str())
    }

    /// Every value of `name`, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.iter()
            .filter(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
            .collect()
    }

    /// Returns true if a field called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes every field called `name`.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(field, _)| !field.eq_ignore_ascii_case(name));
    }

    /// Iterates over `(name, value)` pairs in render order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(field, _)| field.eq_ignore_ascii_case(name))
    }

    /// Checks a caller-supplied field before it is added to a draft.
    ///
    /// Both parts must be present and non-empty. The name must be printable
    /// ASCII without `:` and the value must not contain a line break.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] describing the first problem.
    pub fn validate_field(name: Option<&str>, value: Option<&str>) -> Result<()> {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return Err(Error::InvalidArgument("name can not be null or empty".into()));
        };
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Err(Error::InvalidArgument("value can not be null or empty".into()));
        };

        if name.bytes().any(|b| !b.is_ascii_graphic() || b == b':') {
            return Err(Error::InvalidArgument(format!(
                "header name contains illegal characters: {name}"
            )));
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "header value for {name} contains a line break"
            )));
        }
        Ok(())
    }
}

/// Writes one field, folding before a space whenever the line would pass
/// [`FOLD_WIDTH`]. Words longer than the width are left intact.
fn write_folded(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    write!(f, "{name}:")?;
    let mut width = name.len() + 1;
    for word in value.split(' ') {
        if width + 1 + word.len() > FOLD_WIDTH && width > name.len() + 1 {
            f.write_str("\r\n")?;
            width = 0;
        }
        write!(f, " {word}")?;
        width += 1 + word.len();
    }
    f.write_str("\r\n")
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iter()
            .try_for_each(|(name, value)| write_folded(f, name, value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut headers = Headers::new();
        assert!(headers.is_empty());
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("X-Other", "1");
        headers.add("to", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("To", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);
        assert_eq!(headers.to_string(), "To: charlie@example.com\r\nX-Other: 1\r\n");
    }

    #[test]
    fn test_set_appends_new_field() {
        let mut headers = Headers::new();
        headers.add("From", "a@example.com");
        headers.set("X-Mailer", "mailwright");
        assert_eq!(headers.iter().last(), Some(("X-Mailer", "mailwright")));
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_validate_field_rejects_missing_parts() {
        for (name, value) in [
            (None, Some("validValue")),
            (Some(""), Some("validValue")),
            (Some("validName"), None),
            (Some("validName"), Some("")),
        ] {
            assert!(matches!(
                Headers::validate_field(name, value),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_validate_field_rejects_malformed() {
        assert!(Headers::validate_field(Some("X Bad"), Some("v")).is_err());
        assert!(Headers::validate_field(Some("X:Bad"), Some("v")).is_err());
        assert!(Headers::validate_field(Some("X-Ok"), Some("a\r\nBcc: evil@example.com")).is_err());
        assert!(Headers::validate_field(Some("X-Priority"), Some("1")).is_ok());
    }

    #[test]
    fn test_long_values_fold_at_spaces() {
        let recipients: Vec<String> = (0..8).map(|i| format!("user{i}@example.com")).collect();
        let mut headers = Headers::new();
        headers.add("To", recipients.join(", "));

        let rendered = headers.to_string();
        let lines: Vec<&str> = rendered.trim_end().split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.len() <= FOLD_WIDTH));
        assert!(lines[1..].iter().all(|line| line.starts_with(' ')));
        assert_eq!(lines.concat(), format!("To: {}", recipients.join(", ")));
    }

    #[test]
    fn test_unbreakable_value_is_not_split() {
        let token = "x".repeat(100);
        let mut headers = Headers::new();
        headers.add("X-Token", token.clone());
        assert_eq!(headers.to_string(), format!("X-Token: {token}\r\n"));
    }
}
