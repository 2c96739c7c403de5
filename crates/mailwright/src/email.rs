//! One-object composing and sending.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mailwright_mime::{Address, Draft, Headers, Message};
use mailwright_smtp::{SessionDispatcher, SessionProperties, TransportConfig, TransportOptions};
use std::time::Duration;

/// An email under construction together with the session that sends it.
///
/// Builder calls go to the [`Draft`], transport calls to the
/// [`SessionDispatcher`]. A message is built exactly once, either through
/// [`build_mime_message`](Self::build_mime_message) or implicitly by
/// [`send`](Self::send).
#[derive(Debug, Default)]
pub struct Email {
    draft: Draft,
    dispatcher: SessionDispatcher,
    message: Option<Message>,
}

impl Email {
    /// Creates an empty email with no transport settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Message composition

    /// Sets the sender.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn set_from(&mut self, address: &str) -> Result<&mut Self> {
        self.draft.set_from(address)?;
        Ok(self)
    }

    /// Sets the sender with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn set_from_named(&mut self, address: &str, name: &str) -> Result<&mut Self> {
        self.draft.set_from_named(address, name)?;
        Ok(self)
    }

    /// Appends To recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or any address is invalid.
    pub fn add_to<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.draft.add_to(addresses)?;
        Ok(self)
    }

    /// Appends Cc recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or any address is invalid.
    pub fn add_cc<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.draft.add_cc(addresses)?;
        Ok(self)
    }

    /// Appends Bcc recipients.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or any address is invalid.
    pub fn add_bcc<I, S>(&mut self, addresses: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.draft.add_bcc(addresses)?;
        Ok(self)
    }

    /// Appends a Reply-To address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn add_reply_to(&mut self, address: &str, display_name: &str) -> Result<&mut Self> {
        self.draft.add_reply_to(address, display_name)?;
        Ok(self)
    }

    /// Inserts or overwrites a custom header.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is missing or malformed.
    pub fn add_header<'a>(
        &mut self,
        name: impl Into<Option<&'a str>>,
        value: impl Into<Option<&'a str>>,
    ) -> Result<&mut Self> {
        self.draft.add_header(name, value)?;
        Ok(self)
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.draft.set_subject(subject);
        self
    }

    /// Sets the body with an explicit content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type cannot be parsed.
    pub fn set_content(&mut self, body: impl Into<String>, content_type: &str) -> Result<&mut Self> {
        self.draft.set_content(body, content_type)?;
        Ok(self)
    }

    /// Sets a plain-text body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is `None`.
    pub fn set_msg<'a>(&mut self, msg: impl Into<Option<&'a str>>) -> Result<&mut Self> {
        self.draft.set_msg(msg)?;
        Ok(self)
    }

    /// Replaces the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type cannot be parsed.
    pub fn update_content_type(&mut self, content_type: &str) -> Result<&mut Self> {
        self.draft.update_content_type(content_type)?;
        Ok(self)
    }

    /// Overrides the body charset.
    pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.draft.set_charset(charset);
        self
    }

    /// Sets the sent date; `None` stamps the message at build time.
    pub fn set_sent_date(&mut self, date: impl Into<Option<DateTime<Utc>>>) -> &mut Self {
        self.draft.set_sent_date(date);
        self
    }

    // Transport configuration

    /// Sets the SMTP host.
    pub fn set_host_name(&mut self, host: impl Into<String>) -> &mut Self {
        self.dispatcher.set_host_name(host);
        self
    }

    /// Sets the plain SMTP port.
    pub fn set_smtp_port(&mut self, port: u16) -> &mut Self {
        self.dispatcher.set_smtp_port(port);
        self
    }

    /// Wraps the socket in TLS before the SMTP greeting.
    pub fn set_ssl_on_connect(&mut self, enabled: bool) -> &mut Self {
        self.dispatcher.set_ssl_on_connect(enabled);
        self
    }

    /// Sets the implicit-TLS port.
    pub fn set_ssl_smtp_port(&mut self, port: u16) -> &mut Self {
        self.dispatcher.set_ssl_smtp_port(port);
        self
    }

    /// Upgrades the session with STARTTLS.
    pub fn set_start_tls_enabled(&mut self, enabled: bool) -> &mut Self {
        self.dispatcher.set_start_tls_enabled(enabled);
        self
    }

    /// Fails the send if STARTTLS is not offered.
    pub fn set_start_tls_required(&mut self, required: bool) -> &mut Self {
        self.dispatcher.set_start_tls_required(required);
        self
    }

    /// Sets the socket read/write timeout.
    pub fn set_socket_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.dispatcher.set_socket_timeout(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn set_socket_connection_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.dispatcher.set_socket_connection_timeout(timeout);
        self
    }

    /// Sets AUTH PLAIN credentials.
    pub fn set_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.dispatcher.set_authentication(username, password);
        self
    }

    /// Sets the hostname announced in EHLO/HELO.
    pub fn set_client_hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.dispatcher.set_client_hostname(hostname);
        self
    }

    /// Installs ambient session defaults.
    pub fn set_session(&mut self, session: SessionProperties) -> &mut Self {
        self.dispatcher.set_session(session);
        self
    }

    /// Applies every option set in `options`.
    pub fn configure_transport(&mut self, options: TransportOptions) -> &mut Self {
        self.dispatcher.configure_transport(options);
        self
    }

    // Accessors

    /// Returns the sender.
    #[must_use]
    pub const fn from_address(&self) -> Option<&Address> {
        self.draft.from()
    }

    /// Returns the To list.
    #[must_use]
    pub fn to_addresses(&self) -> &[Address] {
        self.draft.to()
    }

    /// Returns the Cc list.
    #[must_use]
    pub fn cc_addresses(&self) -> &[Address] {
        self.draft.cc()
    }

    /// Returns the Bcc list.
    #[must_use]
    pub fn bcc_addresses(&self) -> &[Address] {
        self.draft.bcc()
    }

    /// Returns the Reply-To list.
    #[must_use]
    pub fn reply_to_addresses(&self) -> &[Address] {
        self.draft.reply_to()
    }

    /// Returns the custom headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        self.draft.headers()
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.draft.subject()
    }

    /// Returns the body.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.draft.content()
    }

    /// Returns the stored sent date, or now.
    #[must_use]
    pub fn sent_date(&self) -> DateTime<Utc> {
        self.draft.sent_date()
    }

    /// Returns the resolved SMTP host.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.dispatcher.host_name()
    }

    /// Returns the draft.
    #[must_use]
    pub const fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &SessionDispatcher {
        &self.dispatcher
    }

    /// Derives the transport configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        Ok(self.dispatcher.transport_config()?)
    }

    /// Renders the derived configuration as session properties.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured.
    pub fn session_properties(&self) -> Result<SessionProperties> {
        Ok(self.dispatcher.session_properties()?)
    }

    // Building and sending

    /// Builds the message. Only the first call succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft is incomplete or was already built.
    pub fn build_mime_message(&mut self) -> Result<&Message> {
        let message = self.draft.build()?;
        Ok(self.message.insert(message))
    }

    /// Returns the built message, if any.
    #[must_use]
    pub const fn mime_message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Sends the previously built message and returns its Message-ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBuilt`] if nothing was built, or any dispatch
    /// error.
    pub async fn send_mime_message(&self) -> Result<String> {
        let message = self.message.as_ref().ok_or(Error::NotBuilt)?;
        Ok(self.dispatcher.send(message).await?)
    }

    /// Builds the message and sends it, returning its Message-ID.
    ///
    /// # Errors
    ///
    /// Returns any build or dispatch error. Calling `send` on an email that
    /// was already built fails with the draft's already-built error.
    pub async fn send(&mut self) -> Result<String> {
        self.build_mime_message()?;
        let id = self.send_mime_message().await?;
        tracing::debug!(message_id = %id, "email sent");
        Ok(id)
    }
}
