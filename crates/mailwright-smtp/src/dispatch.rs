//! Session dispatcher: derives a transport from explicit settings and ambient
//! session properties, then delivers built messages over SMTP.

use crate::config::{
    Credentials, DEFAULT_CLIENT_HOSTNAME, DEFAULT_SMTP_PORT, DEFAULT_SSL_PORT, DEFAULT_TIMEOUT,
    Security, TransportConfig, TransportOptions,
};
use crate::connection::{Client, RcptOutcome, SmtpConnection, connect};
use crate::error::{Error, Result};
use crate::session::SessionProperties;
use mailwright_mime::Message;
use std::fmt;
use std::time::Duration;

/// Progress of a single send, logged at every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has happened yet.
    Idle,
    /// Opening the socket and exchanging greetings.
    Connecting,
    /// Running AUTH.
    Authenticating,
    /// Sending MAIL FROM and RCPT TO.
    SendingEnvelope,
    /// Sending DATA and the message.
    TransmittingBody,
    /// The server accepted the message.
    Completed,
    /// The session was aborted.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::SendingEnvelope => "sending-envelope",
            Self::TransmittingBody => "transmitting-body",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct Progress<'a> {
    host: &'a str,
    state: SessionState,
}

impl<'a> Progress<'a> {
    const fn new(host: &'a str) -> Self {
        Self {
            host,
            state: SessionState::Idle,
        }
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!(host = self.host, from = %self.state, to = %next, "SMTP session state");
        self.state = next;
    }
}

/// Sends built messages over SMTP.
///
/// Explicit settings take precedence over ambient [`SessionProperties`];
/// anything set in neither place uses the defaults (port 25, SSL port 465,
/// 60 second timeouts).
///
/// ```no_run
/// # async fn run(message: mailwright_mime::Message) -> mailwright_smtp::Result<()> {
/// use mailwright_smtp::SessionDispatcher;
///
/// let mut dispatcher = SessionDispatcher::new();
/// dispatcher
///     .set_host_name("smtp.example.com")
///     .set_start_tls_enabled(true)
///     .set_authentication("user", "secret");
/// let id = dispatcher.send(&message).await?;
/// # let _ = id;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionDispatcher {
    options: TransportOptions,
    session: SessionProperties,
}

impl SessionDispatcher {
    /// Creates a dispatcher with no explicit settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every option set in `options`, keeping earlier settings for
    /// the rest.
    pub fn configure_transport(&mut self, options: TransportOptions) -> &mut Self {
        self.options.merge(options);
        self
    }

    /// Installs ambient session defaults.
    pub fn set_session(&mut self, session: SessionProperties) -> &mut Self {
        self.session = session;
        self
    }

    /// Sets the SMTP host.
    pub fn set_host_name(&mut self, host: impl Into<String>) -> &mut Self {
        self.options.host = Some(host.into());
        self
    }

    /// Sets the plain SMTP port.
    pub const fn set_smtp_port(&mut self, port: u16) -> &mut Self {
        self.options.port = Some(port);
        self
    }

    /// Wraps the socket in TLS before the SMTP greeting.
    pub const fn set_ssl_on_connect(&mut self, enabled: bool) -> &mut Self {
        self.options.ssl_on_connect = Some(enabled);
        self
    }

    /// Sets the port used with SSL on connect.
    pub const fn set_ssl_smtp_port(&mut self, port: u16) -> &mut Self {
        self.options.ssl_port = Some(port);
        self
    }

    /// Upgrades plaintext sessions with STARTTLS.
    pub const fn set_start_tls_enabled(&mut self, enabled: bool) -> &mut Self {
        self.options.start_tls = Some(enabled);
        self
    }

    /// Fails the send when the server does not offer STARTTLS.
    pub const fn set_start_tls_required(&mut self, required: bool) -> &mut Self {
        self.options.start_tls_required = Some(required);
        self
    }

    /// Sets the socket read/write timeout.
    pub const fn set_socket_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.socket_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub const fn set_socket_connection_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Sets AUTH PLAIN credentials.
    pub fn set_authentication(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.options.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the hostname announced in EHLO/HELO. It is checked when the
    /// transport is resolved; anything but printable ASCII without spaces
    /// fails with [`Error::InvalidConfig`].
    pub fn set_client_hostname(&mut self, hostname: impl Into<String>) -> &mut Self {
        self.options.client_hostname = Some(hostname.into());
        self
    }

    /// Returns the resolved host: the explicit setting, else the ambient
    /// session's host.
    #[must_use]
    pub fn host_name(&self) -> Option<&str> {
        self.options.resolve_host(&self.session)
    }

    /// Returns the explicitly set SMTP port, or 25.
    #[must_use]
    pub fn smtp_port(&self) -> u16 {
        self.options.port.unwrap_or(DEFAULT_SMTP_PORT)
    }

    /// Returns the explicitly set SSL port, or 465.
    #[must_use]
    pub fn ssl_smtp_port(&self) -> u16 {
        self.options.ssl_port.unwrap_or(DEFAULT_SSL_PORT)
    }

    /// Returns true if SSL on connect was enabled explicitly.
    #[must_use]
    pub fn is_ssl_on_connect(&self) -> bool {
        self.options.ssl_on_connect.unwrap_or(false)
    }

    /// Returns true if STARTTLS was enabled explicitly.
    #[must_use]
    pub fn is_start_tls_enabled(&self) -> bool {
        self.options.start_tls.unwrap_or(false)
    }

    /// Returns true if STARTTLS was made mandatory explicitly.
    #[must_use]
    pub fn is_start_tls_required(&self) -> bool {
        self.options.start_tls_required.unwrap_or(false)
    }

    /// Returns the explicitly set socket timeout, or the default.
    #[must_use]
    pub fn socket_timeout(&self) -> Duration {
        self.options.socket_timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Returns the explicitly set connect timeout, or the default.
    #[must_use]
    pub fn socket_connection_timeout(&self) -> Duration {
        self.options.connect_timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Returns the explicitly set EHLO hostname, or `localhost`.
    #[must_use]
    pub fn client_hostname(&self) -> &str {
        self.options
            .client_hostname
            .as_deref()
            .unwrap_or(DEFAULT_CLIENT_HOSTNAME)
    }

    /// Returns the explicit settings.
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Returns the ambient session properties.
    #[must_use]
    pub const fn session(&self) -> &SessionProperties {
        &self.session
    }

    /// Derives the transport configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHost`] if no host is set anywhere, or
    /// [`Error::InvalidConfig`] for unparsable ambient properties.
    pub fn transport_config(&self) -> Result<TransportConfig> {
        self.options.resolve(&self.session)
    }

    /// Renders the derived configuration as session properties.
    ///
    /// # Errors
    ///
    /// Same as [`transport_config`](Self::transport_config).
    pub fn session_properties(&self) -> Result<SessionProperties> {
        Ok(self.transport_config()?.to_properties())
    }

    /// Delivers `message` to every envelope recipient and returns its
    /// Message-ID.
    ///
    /// The socket is closed on every exit path.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingHost`] or [`Error::InvalidConfig`] before connecting
    /// - transport errors ([`Error::is_transport`]) if the connection,
    ///   TLS negotiation or any exchange fails or times out
    /// - [`Error::Delivery`] if the server refuses any recipient; no DATA is
    ///   sent in that case
    /// - [`Error::MessageTooLarge`] if the message exceeds the advertised SIZE
    /// - [`Error::SmtpError`] for any other refusal
    pub async fn send(&self, message: &Message) -> Result<String> {
        let config = self.transport_config()?;
        let mut progress = Progress::new(&config.host);

        match deliver(&config, message, &mut progress).await {
            Ok(()) => {
                progress.advance(SessionState::Completed);
                tracing::info!(
                    host = %config.host,
                    message_id = message.message_id(),
                    recipients = message.envelope().recipients.len(),
                    "message sent"
                );
                Ok(message.message_id().to_string())
            }
            Err(e) => {
                let failed_in = progress.state;
                progress.advance(SessionState::Failed);
                tracing::warn!(host = %config.host, state = %failed_in, error = %e, "send failed");
                Err(e)
            }
        }
    }
}

async fn deliver(
    config: &TransportConfig,
    message: &Message,
    progress: &mut Progress<'_>,
) -> Result<()> {
    progress.advance(SessionState::Connecting);
    tracing::debug!(
        host = %config.host,
        port = config.port,
        security = ?config.security,
        "connecting"
    );
    let stream = connect(config).await?;
    let mut client = Client::from_stream(stream)
        .await?
        .greet(&config.client_hostname)
        .await?;

    if config.security == Security::StartTls {
        if client.server_info().supports_starttls() {
            client = client
                .starttls(&config.host, &config.client_hostname)
                .await?;
        } else if config.start_tls_required {
            return Err(Error::NotSupported("STARTTLS".into()));
        } else {
            tracing::warn!(host = %config.host, "STARTTLS not offered, continuing in plaintext");
        }
    }

    let formatted = message.formatted();
    if let Some(limit) = client.server_info().max_message_size() {
        if formatted.len() > limit {
            return Err(Error::MessageTooLarge {
                size: formatted.len(),
                limit,
            });
        }
    }
    let size = client
        .server_info()
        .supports_size()
        .then_some(formatted.len());

    let envelope = message.envelope();
    let transaction = match &config.credentials {
        Some(credentials) => {
            progress.advance(SessionState::Authenticating);
            let client = client
                .auth_plain(&credentials.username, &credentials.password)
                .await?;
            progress.advance(SessionState::SendingEnvelope);
            client.mail_from(&envelope.sender, size).await?
        }
        None => {
            progress.advance(SessionState::SendingEnvelope);
            client.mail_from(&envelope.sender, size).await?
        }
    };

    let client = match transaction.rcpt_to_all(&envelope.recipients).await? {
        RcptOutcome::Accepted(client) => client,
        RcptOutcome::Rejected { client, rejected } => {
            tracing::warn!(rejected = rejected.len(), "recipients refused, resetting");
            let closed = match client.reset().await {
                Ok(client) => client.quit().await,
                Err(e) => Err(e),
            };
            if let Err(e) = closed {
                tracing::debug!(error = %e, "reset after refusal failed");
            }
            return Err(Error::Delivery { rejected });
        }
    };

    progress.advance(SessionState::TransmittingBody);
    let client = client.data().await?.send_message(&formatted).await?;

    if let Err(e) = client.quit().await {
        tracing::debug!(error = %e, "QUIT failed after delivery");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_host_precedence() {
        let mut dispatcher = SessionDispatcher::new();
        assert_eq!(dispatcher.host_name(), None);

        dispatcher.set_session([(SessionProperties::HOST, "ambient.example.com")].into_iter().collect());
        assert_eq!(dispatcher.host_name(), Some("ambient.example.com"));

        dispatcher.set_host_name("explicit.example.com");
        assert_eq!(dispatcher.host_name(), Some("explicit.example.com"));
    }

    #[test]
    fn test_missing_host() {
        let dispatcher = SessionDispatcher::new();
        assert!(matches!(dispatcher.transport_config(), Err(Error::MissingHost)));
        assert!(matches!(dispatcher.session_properties(), Err(Error::MissingHost)));
    }

    #[test]
    fn test_ssl_session_properties() {
        let mut dispatcher = SessionDispatcher::new();
        dispatcher
            .set_host_name("smtp.example.com")
            .set_smtp_port(25)
            .set_ssl_on_connect(true)
            .set_ssl_smtp_port(465);

        let props = dispatcher.session_properties().unwrap();
        assert_eq!(props.get(SessionProperties::SOCKET_FACTORY_PORT), Some("465"));
        assert_eq!(
            props.get(SessionProperties::SOCKET_FACTORY_CLASS),
            Some(SessionProperties::SSL_SOCKET_FACTORY)
        );
        assert_eq!(props.get(SessionProperties::PORT), Some("465"));
        assert!(dispatcher.is_ssl_on_connect());
    }

    #[test]
    fn test_start_tls_session_properties() {
        let mut dispatcher = SessionDispatcher::new();
        dispatcher
            .set_host_name("smtp.example.com")
            .set_start_tls_enabled(true);

        let props = dispatcher.session_properties().unwrap();
        assert_eq!(props.get(SessionProperties::STARTTLS_ENABLE), Some("true"));
        assert_eq!(props.get(SessionProperties::SOCKET_FACTORY_CLASS), None);
        assert_eq!(dispatcher.transport_config().unwrap().security, Security::StartTls);
    }

    #[test]
    fn test_timeouts() {
        let mut dispatcher = SessionDispatcher::new();
        dispatcher
            .set_host_name("smtp.example.com")
            .set_socket_timeout(Duration::from_millis(5000))
            .set_socket_connection_timeout(Duration::from_millis(10000));

        assert_eq!(dispatcher.socket_timeout(), Duration::from_secs(5));
        assert_eq!(dispatcher.socket_connection_timeout(), Duration::from_secs(10));

        let props = dispatcher.session_properties().unwrap();
        assert_eq!(props.get(SessionProperties::TIMEOUT), Some("5000"));
        assert_eq!(props.get(SessionProperties::CONNECTION_TIMEOUT), Some("10000"));
    }

    #[test]
    fn test_defaults() {
        let dispatcher = SessionDispatcher::new();
        assert_eq!(dispatcher.smtp_port(), 25);
        assert_eq!(dispatcher.ssl_smtp_port(), 465);
        assert_eq!(dispatcher.socket_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(dispatcher.client_hostname(), "localhost");
        assert!(!dispatcher.is_start_tls_enabled());
        assert!(!dispatcher.is_start_tls_required());
    }

    #[test]
    fn test_configure_transport_merges() {
        let mut dispatcher = SessionDispatcher::new();
        dispatcher.set_host_name("smtp.example.com").set_smtp_port(2525);
        dispatcher.configure_transport(TransportOptions {
            start_tls: Some(true),
            ..TransportOptions::default()
        });

        let config = dispatcher.transport_config().unwrap();
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::StartTls);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::SendingEnvelope.to_string(), "sending-envelope");
        assert_eq!(SessionState::Failed.to_string(), "failed");
    }
}
