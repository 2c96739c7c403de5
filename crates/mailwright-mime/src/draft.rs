//! Mutable message drafts.

use crate::address::{Address, AddressList, join_header_value};
use crate::content_type::ContentType;
use crate::encoding::{encode_quoted_printable, encode_rfc2047, is_seven_bit_safe};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Envelope, Message, TransferEncoding, generate_message_id};
use chrono::{DateTime, Utc};

/// Which address list an `add_*` call targets.
#[derive(Debug, Clone, Copy)]
enum Recipients {
    To,
    Cc,
    Bcc,
}

/// A message under construction.
///
/// A draft collects the sender, recipients, subject, body and extra headers
/// of one outgoing email and is turned into an immutable [`Message`] by
/// [`build`](Self::build). Building succeeds at most once per draft.
///
/// ```ignore
/// use mailwright_mime::Draft;
///
/// let mut draft = Draft::new();
/// draft
///     .set_from("sender@example.com")?
///     .add_to(["recipient@example.com"])?
///     .set_subject("Test Subject")
///     .set_msg("Test Message")?;
/// let message = draft.build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Draft {
    from: Option<Address>,
    to: AddressList,
    cc: AddressList,
    bcc: AddressList,
    reply_to: AddressList,
    subject: Option<String>,
    content: Option<String>,
    content_type: Option<ContentType>,
    charset: Option<String>,
    headers: Headers,
    sent_date: Option<DateTime<Utc>>,
    built: bool,
}

impl Draft {
    /// Creates an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address cannot be parsed.
    pub fn set_from(&mut self, address: &str) -> Result<&mut Self> {
        self.from = Some(Address::parse(address)?);
        Ok(self)
    }

    /// Sets the sender with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address cannot be parsed.
    pub fn set_from_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.from = Some(Address::with_name(address, name)?);
        Ok(self)
    }

    /// Appends addresses to the To list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyInput`] if no addresses are given, or
    /// [`Error::InvalidAddress`] if any address is invalid. The list is left
    /// unchanged on error.
    pub fn add_to<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_recipients(Recipients::To, addresses)
    }

    /// Appends addresses to the Cc list.
    ///
    /// # Errors
    ///
    /// Same as [`add_to`](Self::add_to).
    pub fn add_cc<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_recipients(Recipients::Cc, addresses)
    }

    /// Appends addresses to the Bcc list.
    ///
    /// Passing `None` is equivalent to passing an empty list.
    ///
    /// # Errors
    ///
    /// Same as [`add_to`](Self::add_to).
    pub fn add_bcc<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_recipients(Recipients::Bcc, addresses)
    }

    fn add_recipients<I, S>(&mut self, kind: Recipients, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = addresses
            .into_iter()
            .map(|a| Address::parse(a.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if parsed.is_empty() {
            return Err(Error::EmptyInput);
        }

        tracing::trace!(?kind, count = parsed.len(), "adding recipients");
        let list = match kind {
            Recipients::To => &mut self.to,
            Recipients::Cc => &mut self.cc,
            Recipients::Bcc => &mut self.bcc,
        };
        list.extend(parsed);
        Ok(self)
    }

    /// Appends a Reply-To address with a display name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is invalid.
    pub fn add_reply_to(&mut self, address: &str, display_name: &str) -> Result<&mut Self> {
        self.reply_to.push(Address::with_name(address, display_name)?);
        Ok(self)
    }

    /// Inserts or overwrites a custom header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name or value is missing,
    /// empty or malformed. The header set is unchanged on error.
    pub fn add_header<'a>(
        &mut self,
        name: impl Into<Option<&'a str>>,
        value: impl Into<Option<&'a str>>,
    ) -> Result<&mut Self> {
        let (name, value) = (name.into(), value.into());
        Headers::validate_field(name, value)?;
        if let (Some(name), Some(value)) = (name, value) {
            self.headers.set(name, value);
        }
        Ok(self)
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the body and its content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if the content type cannot be
    /// parsed.
    pub fn set_content(&mut self, body: impl Into<String>, content_type: &str) -> Result<&mut Self> {
        let content_type = ContentType::parse(content_type)?;
        self.content = Some(body.into());
        self.content_type = Some(content_type);
        Ok(self)
    }

    /// Sets a plain-text body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the body is `None`.
    pub fn set_msg<'a>(&mut self, msg: impl Into<Option<&'a str>>) -> Result<&mut Self> {
        let msg = msg
            .into()
            .ok_or_else(|| Error::InvalidMessage("Message cannot be null".into()))?;
        self.content = Some(msg.to_string());
        self.content_type = Some(ContentType::text_plain());
        Ok(self)
    }

    /// Replaces the body content type without touching the body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContentType`] if the value cannot be parsed.
    pub fn update_content_type(&mut self, content_type: &str) -> Result<&mut Self> {
        self.content_type = Some(ContentType::parse(content_type)?);
        Ok(self)
    }

    /// Overrides the body charset.
    pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the sent date. `None` stamps the message at build time.
    pub fn set_sent_date(&mut self, date: impl Into<Option<DateTime<Utc>>>) -> &mut Self {
        self.sent_date = date.into();
        self
    }

    /// Returns the sender, if set.
    #[must_use]
    pub const fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    /// Returns the To list.
    #[must_use]
    pub fn to(&self) -> &[Address] {
        &self.to
    }

    /// Returns the Cc list.
    #[must_use]
    pub fn cc(&self) -> &[Address] {
        &self.cc
    }

    /// Returns the Bcc list.
    #[must_use]
    pub fn bcc(&self) -> &[Address] {
        &self.bcc
    }

    /// Returns the Reply-To list.
    #[must_use]
    pub fn reply_to(&self) -> &[Address] {
        &self.reply_to
    }

    /// Returns the subject, if set.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns the body, if set.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Returns the body content type, if set.
    #[must_use]
    pub const fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// Returns the charset override, if set.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// Returns the custom headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the sent date, or the current time if none is set.
    #[must_use]
    pub fn sent_date(&self) -> DateTime<Utc> {
        self.sent_date.unwrap_or_else(Utc::now)
    }

    /// Returns true once [`build`](Self::build) has succeeded.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.built
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyBuilt`] if this draft was already built
    /// - [`Error::MissingSender`] if no sender is set
    /// - [`Error::MissingRecipient`] if To, Cc and Bcc are all empty
    pub fn build(&mut self) -> Result<Message> {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }

        let sender = self.from.clone().ok_or(Error::MissingSender)?;
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::MissingRecipient);
        }

        let sent_date = self.sent_date();
        let message_id = generate_message_id(sender.domain(), sent_date);

        let mut content_type = self
            .content_type
            .clone()
            .unwrap_or_else(ContentType::text_plain);
        if let Some(charset) = &self.charset {
            content_type.set_charset(charset.clone());
        }

        let content = self.content.as_deref().unwrap_or_default();
        let (transfer_encoding, body) = if is_seven_bit_safe(content) {
            (TransferEncoding::SevenBit, content.as_bytes().to_vec())
        } else {
            (
                TransferEncoding::QuotedPrintable,
                encode_quoted_printable(content).into_bytes(),
            )
        };

        let mut headers = Headers::new();
        headers.add("Date", sent_date.to_rfc2822());
        headers.add("From", sender.to_header_value());
        if !self.to.is_empty() {
            headers.add("To", join_header_value(&self.to));
        }
        if !self.cc.is_empty() {
            headers.add("Cc", join_header_value(&self.cc));
        }
        if !self.reply_to.is_empty() {
            headers.add("Reply-To", join_header_value(&self.reply_to));
        }
        if let Some(subject) = &self.subject {
            headers.add("Subject", encode_rfc2047(subject, "utf-8"));
        }
        headers.add("Message-ID", message_id.clone());
        headers.add("MIME-Version", "1.0");
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", transfer_encoding.to_string());
        for (name, value) in self.headers.iter() {
            headers.set(name, value);
        }

        let recipients = self
            .to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .cloned()
            .collect();

        self.built = true;
        tracing::debug!(%message_id, from = sender.email(), "message built");

        Ok(Message {
            headers,
            text: content.to_string(),
            body,
            content_type,
            transfer_encoding,
            sent_date,
            message_id,
            envelope: Envelope { sender, recipients },
        })
    }
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
    use chrono::{Duration, TimeZone};

    const TEST_EMAIL: &str = "testemail@email.com";

    fn ready_draft(subject: &str, msg: &str) -> Draft {
        let mut draft = Draft::new();
        draft
            .set_from(TEST_EMAIL)
            .unwrap()
            .add_to([TEST_EMAIL])
            .unwrap()
            .set_subject(subject)
            .set_msg(msg)
            .unwrap();
        draft
    }

    #[test]
    fn test_add_bcc() {
        let mut draft = Draft::new();
        draft.add_bcc(["bcc1@test.com", "bcc2@test.com"]).unwrap();
        assert_eq!(draft.bcc().len(), 2);
        assert_eq!(draft.bcc()[0].email(), "bcc1@test.com");
    }

    #[test]
    fn test_add_bcc_empty_input() {
        let mut draft = Draft::new();
        assert!(matches!(draft.add_bcc(None::<&str>), Err(Error::EmptyInput)));
        assert!(matches!(
            draft.add_bcc(Vec::<String>::new()),
            Err(Error::EmptyInput)
        ));
        assert!(draft.bcc().is_empty());
    }

    #[test]
    fn test_add_cc() {
        let mut draft = Draft::new();
        draft.add_cc(["cc@test.com"]).unwrap();
        assert_eq!(draft.cc().len(), 1);
        assert_eq!(draft.cc()[0].email(), "cc@test.com");
    }

    #[test]
    fn test_add_to_is_all_or_nothing() {
        let mut draft = Draft::new();
        draft.add_to(["first@test.com"]).unwrap();
        let result = draft.add_to(["second@test.com", "invalid-email"]);
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
        assert_eq!(draft.to().len(), 1);
        assert_eq!(draft.to()[0].email(), "first@test.com");
    }

    #[test]
    fn test_add_to_keeps_duplicates_in_order() {
        let mut draft = Draft::new();
        draft
            .add_to(["b@test.com", "a@test.com", "b@test.com"])
            .unwrap();
        let emails: Vec<_> = draft.to().iter().map(Address::email).collect();
        assert_eq!(emails, vec!["b@test.com", "a@test.com", "b@test.com"]);
    }

    #[test]
    fn test_add_reply_to() {
        let mut draft = Draft::new();
        draft.add_reply_to("reply@test.com", "Reply Person").unwrap();
        assert_eq!(draft.reply_to().len(), 1);
        assert_eq!(draft.reply_to()[0].email(), "reply@test.com");
        assert_eq!(draft.reply_to()[0].name(), Some("Reply Person"));
    }

    #[test]
    fn test_add_header() {
        let mut draft = Draft::new();
        draft.add_header("X-Priority", "1").unwrap();
        draft.add_header("x-priority", "2").unwrap();
        assert_eq!(draft.headers().get_all("X-Priority"), vec!["2"]);
    }

    #[test]
    fn test_add_header_invalid_input_leaves_headers_unchanged() {
        let mut draft = Draft::new();
        assert!(draft.add_header(None, "validValue").is_err());
        assert!(draft.add_header("", "validValue").is_err());
        assert!(draft.add_header("validName", None).is_err());
        assert!(draft.add_header("validName", "").is_err());
        assert!(draft.headers().is_empty());
    }

    #[test]
    fn test_set_msg_none() {
        let mut draft = Draft::new();
        assert!(matches!(draft.set_msg(None), Err(Error::InvalidMessage(_))));
        assert!(draft.content().is_none());
    }

    #[test]
    fn test_set_from() {
        let mut draft = Draft::new();
        draft.set_from(TEST_EMAIL).unwrap();
        assert_eq!(draft.from(), Some(&Address::new(TEST_EMAIL).unwrap()));
        assert!(draft.set_from("not an address").is_err());
    }

    #[test]
    fn test_update_content_type() {
        let mut draft = Draft::new();
        draft.update_content_type("text/plain").unwrap();
        draft.update_content_type("text/plain").unwrap();
        assert_eq!(draft.content_type().unwrap().mime_type(), "text/plain");
        assert!(draft.update_content_type("garbage").is_err());
    }

    #[test]
    fn test_sent_date_round_trip() {
        let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut draft = Draft::new();
        draft.set_sent_date(date);
        assert_eq!(draft.sent_date(), date);
    }

    #[test]
    fn test_sent_date_none_defaults_to_now() {
        let mut draft = Draft::new();
        draft.set_sent_date(None);
        let delta = Utc::now() - draft.sent_date();
        assert!(delta.abs() < Duration::seconds(1));
    }

    #[test]
    fn test_build() {
        let mut draft = ready_draft("Test Subject", "Test Message");
        let message = draft.build().unwrap();
        assert!(draft.is_built());
        assert_eq!(message.content(), "Test Message");
        assert_eq!(message.subject().as_deref(), Some("Test Subject"));
        assert_eq!(message.header("From"), Some(TEST_EMAIL));
        assert_eq!(message.header("To"), Some(TEST_EMAIL));
        assert_eq!(message.header("Message-ID"), Some(message.message_id()));
    }

    #[test]
    fn test_build_twice() {
        let mut draft = ready_draft("Test Subject", "Test Message");
        draft.build().unwrap();
        assert!(matches!(draft.build(), Err(Error::AlreadyBuilt)));
    }

    #[test]
    fn test_build_without_from() {
        let mut draft = Draft::new();
        draft.add_to([TEST_EMAIL]).unwrap().set_subject("No From Address");
        assert!(matches!(draft.build(), Err(Error::MissingSender)));
        assert!(!draft.is_built());
    }

    #[test]
    fn test_build_without_recipients() {
        let mut draft = Draft::new();
        draft.set_from(TEST_EMAIL).unwrap().set_subject("No Recipients");
        assert!(matches!(draft.build(), Err(Error::MissingRecipient)));
    }

    #[test]
    fn test_build_bcc_only() {
        let mut draft = Draft::new();
        draft
            .set_from(TEST_EMAIL)
            .unwrap()
            .add_bcc(["hidden@test.com"])
            .unwrap();
        let message = draft.build().unwrap();
        assert!(message.header("To").is_none());
        assert!(message.header("Bcc").is_none());
        assert_eq!(message.envelope().recipients.len(), 1);
    }

    #[test]
    fn test_build_envelope_order() {
        let mut draft = Draft::new();
        draft
            .set_from(TEST_EMAIL)
            .unwrap()
            .add_bcc(["bcc@test.com"])
            .unwrap()
            .add_cc(["cc@test.com"])
            .unwrap()
            .add_to(["to@test.com"])
            .unwrap();
        let message = draft.build().unwrap();
        let rcpts: Vec<_> = message
            .envelope()
            .recipients
            .iter()
            .map(Address::email)
            .collect();
        assert_eq!(rcpts, vec!["to@test.com", "cc@test.com", "bcc@test.com"]);
        assert_eq!(message.envelope().sender.email(), TEST_EMAIL);
    }

    #[test]
    fn test_build_with_reply_to() {
        let mut draft = ready_draft("Reply-To Test", "Message with reply-to");
        draft.add_reply_to("reply@example.com", "Reply Name").unwrap();
        let message = draft.build().unwrap();
        assert_eq!(draft.reply_to().len(), 1);
        assert_eq!(
            message.header("Reply-To"),
            Some("Reply Name <reply@example.com>")
        );
    }

    #[test]
    fn test_build_text_plain_content() {
        let mut draft = Draft::new();
        draft
            .set_from(TEST_EMAIL)
            .unwrap()
            .add_to([TEST_EMAIL])
            .unwrap()
            .set_subject("Text Content")
            .set_content("This is plain text", "text/plain")
            .unwrap();
        let message = draft.build().unwrap();
        assert_eq!(message.content(), "This is plain text");
        assert_eq!(message.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_build_with_custom_header() {
        let mut draft = ready_draft("Headers Test", "Message with headers");
        draft.add_header("X-Custom-Header", "CustomValue").unwrap();
        let message = draft.build().unwrap();
        assert_eq!(message.header("X-Custom-Header"), Some("CustomValue"));
    }

    #[test]
    fn test_build_sets_sent_date() {
        let mut draft = ready_draft("Sent Date Test", "Check sent date");
        let message = draft.build().unwrap();
        let delta = Utc::now() - message.sent_date();
        assert!(delta.abs() < Duration::seconds(1));
        assert_eq!(
            message.header("Date"),
            Some(message.sent_date().to_rfc2822().as_str())
        );
    }

    #[test]
    fn test_build_uses_explicit_sent_date() {
        let date = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let mut draft = ready_draft("Dated", "body");
        draft.set_sent_date(date);
        assert_eq!(draft.build().unwrap().sent_date(), date);
    }

    #[test]
    fn test_build_non_ascii_body_and_charset() {
        let mut draft = ready_draft("Grüße", "Grüße aus Köln");
        draft.set_charset("utf-8");
        let message = draft.build().unwrap();
        assert_eq!(
            message.transfer_encoding(),
            TransferEncoding::QuotedPrintable
        );
        assert!(message.raw_body().is_ascii());
        assert_eq!(message.content(), "Grüße aus Köln");
        assert_eq!(message.subject().as_deref(), Some("Grüße"));
        assert!(message.formatted().is_ascii());
    }

    #[test]
    fn test_build_multiline_non_ascii_body_keeps_line_endings() {
        for body in ["Grüße\nzweite Zeile", "Grüße\r\nzweite Zeile\n", "ä\r\nb\nc\r"] {
            let message = ready_draft("Lines", body).build().unwrap();
            assert_eq!(message.transfer_encoding(), TransferEncoding::QuotedPrintable);
            assert_eq!(message.content(), body);
            let wire = String::from_utf8(message.raw_body().to_vec()).unwrap();
            assert!(!wire.replace("\r\n", "").contains('\n'));
        }
    }

    #[test]
    fn test_reply_to_name_cannot_inject_headers() {
        let mut draft = ready_draft("Injection", "body");
        assert!(matches!(
            draft.add_reply_to("r@example.com", "Evil\r\nBcc: spy@evil.example"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(draft.set_from_named(TEST_EMAIL, "Evil\nBcc: spy@evil.example").is_err());
        assert!(draft.reply_to().is_empty());

        let formatted = String::from_utf8(draft.build().unwrap().formatted()).unwrap();
        assert!(!formatted.contains("spy@evil.example"));
    }

    #[test]
    fn test_build_charset_override() {
        let mut draft = ready_draft("Charset", "plain");
        draft.set_charset("us-ascii");
        let message = draft.build().unwrap();
        assert_eq!(message.content_type().charset(), Some("us-ascii"));
    }
}
