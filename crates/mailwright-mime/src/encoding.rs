//! Transfer and header encodings used when rendering a message.
//!
//! Bodies that are not 7-bit safe go out as Quoted-Printable (RFC 2045
//! section 6.7); non-ASCII subjects and display names become RFC 2047 `B`
//! encoded words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Longest encoded Quoted-Printable line, excluding CRLF.
const QP_LINE_LIMIT: usize = 76;

/// Longest line (excluding CRLF) allowed in a `7bit` body.
const SEVEN_BIT_LINE_LIMIT: usize = 998;

/// Longest RFC 2047 encoded word.
const ENCODED_WORD_LIMIT: usize = 75;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Returns true if the body can be sent as-is with `7bit` transfer encoding.
#[must_use]
pub fn is_seven_bit_safe(text: &str) -> bool {
    text.is_ascii()
        && !text.contains('\0')
        && text
            .split('\n')
            .all(|line| line.trim_end_matches('\r').len() <= SEVEN_BIT_LINE_LIMIT)
}

/// Encodes text as Quoted-Printable.
///
/// Line breaks (`\n` or `\r\n`) stay hard CRLF breaks. Encoded lines are
/// kept within 76 characters with `=` soft breaks, and whitespace at the end
/// of a line is escaped.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        encode_qp_line(line.strip_suffix('\r').unwrap_or(line).as_bytes(), &mut out);
    }
    out
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut width = 0;
    for (i, &byte) in line.iter().enumerate() {
        let at_end = i + 1 == line.len();
        let literal = match byte {
            b'=' => false,
            b' ' | b'\t' => !at_end,
            b'!'..=b'~' => true,
            _ => false,
        };
        let atom_len = if literal { 1 } else { 3 };

        // Leave room for the soft break unless this atom ends the line
        let budget = if at_end { QP_LINE_LIMIT } else { QP_LINE_LIMIT - 1 };
        if width + atom_len > budget {
            out.push_str("=\r\n");
            width = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            out.push('=');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0F)]));
        }
        width += atom_len;
    }
}

/// Decodes Quoted-Printable text.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] for malformed `=XX` escapes and
/// [`Error::Utf8Decode`] if the decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while let Some(&byte) = bytes.get(i) {
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(b'\r'), Some(b'\n')) => i += 3,
            (Some(b'\n'), _) => i += 2,
            (None, _) | (Some(b'\r'), None) => break,
            (Some(&hi), Some(&lo)) => {
                let value = hex_value(hi)
                    .zip(hex_value(lo))
                    .map(|(hi, lo)| (hi << 4) | lo)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid escape ={}{}",
                            char::from(hi),
                            char::from(lo)
                        ))
                    })?;
                out.push(value);
                i += 3;
            }
            (Some(_), None) => {
                return Err(Error::InvalidEncoding("Truncated escape".into()));
            }
        }
    }

    Ok(String::from_utf8(out)?)
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Encodes a header value as RFC 2047 `B` encoded words when needed.
///
/// Plain ASCII without `=?` passes through unchanged. Longer values are split
/// on character boundaries into several words separated by a space.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    let needs_encoding = !text.is_ascii()
        || text.contains("=?")
        || text.chars().any(|c| c.is_ascii_control());
    if !needs_encoding {
        return text.to_string();
    }

    // Base64 turns every 3 input bytes into 4 output characters
    let overhead = "=?".len() + charset.len() + "?B?".len() + "?=".len();
    let max_chunk = (ENCODED_WORD_LIMIT.saturating_sub(overhead) / 4 * 3).max(3);

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if !chunk.is_empty() && chunk.len() + ch.len_utf8() > max_chunk {
            words.push(encoded_word(&chunk, charset));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk, charset));
    }
    words.join(" ")
}

fn encoded_word(chunk: &str, charset: &str) -> String {
    format!("=?{charset}?B?{}?=", STANDARD.encode(chunk.as_bytes()))
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped; other text is
/// kept as is.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`] for a malformed encoded word.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = "";
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let Some((decoded, consumed)) = decode_encoded_word(candidate)? else {
            out.push_str(pending_space);
            out.push_str(before);
            out.push_str("=?");
            pending_space = "";
            after_word = false;
            rest = &candidate[2..];
            continue;
        };

        if !(after_word && before.trim().is_empty()) {
            out.push_str(pending_space);
            out.push_str(before);
        }
        out.push_str(&decoded);
        pending_space = "";
        after_word = true;
        rest = &candidate[consumed..];

        let trimmed = rest.trim_start();
        if trimmed.starts_with("=?") {
            pending_space = &rest[..rest.len() - trimmed.len()];
            rest = trimmed;
        }
    }

    out.push_str(pending_space);
    out.push_str(rest);
    Ok(out)
}

/// Decodes the encoded word at the start of `text`, returning the decoded
/// text and the number of bytes consumed, or `None` if `text` does not start
/// with a well-formed `=?charset?enc?data?=` token.
fn decode_encoded_word(text: &str) -> Result<Option<(String, usize)>> {
    let Some(body) = text.strip_prefix("=?") else {
        return Ok(None);
    };
    let mut parts = body.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(tail)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };
    let Some(end) = tail.find("?=") else {
        return Ok(None);
    };
    if charset.is_empty() || charset.contains(char::is_whitespace) {
        return Ok(None);
    }

    let data = &tail[..end];
    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    let decoded = match encoding {
        "B" | "b" => {
            let bytes = STANDARD
                .decode(data)
                .map_err(|e| Error::InvalidEncoding(format!("Invalid base64: {e}")))?;
            String::from_utf8(bytes)?
        }
        "Q" | "q" => decode_quoted_printable(&data.replace('_', " "))?,
        other => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoded-word encoding: {other}"
            )));
        }
    };

    Ok(Some((decoded, consumed)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seven_bit_safe() {
        assert!(is_seven_bit_safe("Test Message"));
        assert!(is_seven_bit_safe("line one\r\nline two\n"));
        assert!(!is_seven_bit_safe("Héllo"));
        assert!(!is_seven_bit_safe("nul\0byte"));
        assert!(!is_seven_bit_safe(&"x".repeat(999)));
    }

    #[test]
    fn test_qp_keeps_hard_line_breaks() {
        assert_eq!(encode_quoted_printable("a\nb\r\nc"), "a\r\nb\r\nc");
        assert_eq!(encode_quoted_printable("Héllo"), "H=C3=A9llo");
        assert_eq!(encode_quoted_printable("1 = 1"), "1 =3D 1");
    }

    #[test]
    fn test_qp_escapes_trailing_whitespace() {
        assert_eq!(encode_quoted_printable("end \nnext\t"), "end=20\r\nnext=09");
    }

    #[test]
    fn test_qp_soft_breaks_respect_limit() {
        let text = "é".repeat(60);
        let encoded = encode_quoted_printable(&text);
        assert!(encoded.split("\r\n").all(|line| line.len() <= QP_LINE_LIMIT));
        assert_eq!(decode_quoted_printable(&encoded).unwrap(), text);
    }

    #[test]
    fn test_qp_decode() {
        assert_eq!(decode_quoted_printable("H=C3=a9llo").unwrap(), "Héllo");
        assert_eq!(decode_quoted_printable("Hello=\r\nWorld=\nAgain").unwrap(), "HelloWorldAgain");
        assert_eq!(decode_quoted_printable("trailing=").unwrap(), "trailing");
        assert!(matches!(
            decode_quoted_printable("bad=ZZ"),
            Err(Error::InvalidEncoding(_))
        ));
        assert!(decode_quoted_printable("=FF").is_err());
    }

    #[test]
    fn test_qp_line_breaks_become_crlf_on_the_wire() {
        let text = "Grüße\nzweite Zeile = gleich\n.punkt";
        let encoded = encode_quoted_printable(text);
        assert!(encoded.is_ascii());
        assert_eq!(
            decode_quoted_printable(&encoded).unwrap(),
            text.replace('\n', "\r\n")
        );
    }

    #[test]
    fn test_rfc2047_passthrough() {
        assert_eq!(encode_rfc2047("Hello, World", "utf-8"), "Hello, World");
        assert_eq!(decode_rfc2047("Hello, World").unwrap(), "Hello, World");
        assert_eq!(decode_rfc2047("a =? b").unwrap(), "a =? b");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Héllo", "utf-8"), "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_long_value_splits_into_words() {
        let subject = "Überraschung für alle Mitarbeiterinnen und Mitarbeiter im Büro";
        let encoded = encode_rfc2047(subject, "utf-8");
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= ENCODED_WORD_LIMIT));
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_rfc2047_decode_mixed() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?=").unwrap(), "Héllo there");
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= world").unwrap(),
            "Re: Héllo world"
        );
        assert!(matches!(
            decode_rfc2047("=?utf-8?X?abc?="),
            Err(Error::InvalidEncoding(_))
        ));
    }
}
