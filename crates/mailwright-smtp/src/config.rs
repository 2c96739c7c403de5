//! Transport configuration types.

use crate::error::{Error, Result};
use crate::session::SessionProperties;
use std::fmt;
use std::time::Duration;

/// Default plain SMTP port.
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default implicit-TLS SMTP port.
pub const DEFAULT_SSL_PORT: u16 = 465;

/// Default connect and I/O timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Hostname announced in EHLO/HELO unless configured otherwise.
pub const DEFAULT_CLIENT_HOSTNAME: &str = "localhost";

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption.
    #[default]
    None,
    /// Start with plaintext, upgrade with STARTTLS.
    StartTls,
    /// TLS from the start, before the SMTP greeting.
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => DEFAULT_SMTP_PORT,
            Self::Implicit => DEFAULT_SSL_PORT,
        }
    }
}

/// Username and password for AUTH PLAIN.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolved SMTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Abort instead of continuing in plaintext when STARTTLS is unavailable.
    pub start_tls_required: bool,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
    /// Credentials for AUTH PLAIN, if any.
    pub credentials: Option<Credentials>,
    /// Hostname announced in EHLO/HELO.
    pub client_hostname: String,
}

impl TransportConfig {
    /// Creates a plaintext configuration on port 25.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Renders this configuration as session properties.
    #[must_use]
    pub fn to_properties(&self) -> SessionProperties {
        let mut props = SessionProperties::new();
        props
            .set(SessionProperties::HOST, self.host.clone())
            .set(SessionProperties::PORT, self.port.to_string())
            .set(
                SessionProperties::TIMEOUT,
                self.io_timeout.as_millis().to_string(),
            )
            .set(
                SessionProperties::CONNECTION_TIMEOUT,
                self.connect_timeout.as_millis().to_string(),
            )
            .set(
                SessionProperties::AUTH,
                self.credentials.is_some().to_string(),
            )
            .set(SessionProperties::LOCALHOST, self.client_hostname.clone());

        match self.security {
            Security::Implicit => {
                props
                    .set(SessionProperties::SOCKET_FACTORY_PORT, self.port.to_string())
                    .set(
                        SessionProperties::SOCKET_FACTORY_CLASS,
                        SessionProperties::SSL_SOCKET_FACTORY,
                    )
                    .set(SessionProperties::SOCKET_FACTORY_FALLBACK, "false");
            }
            Security::StartTls => {
                props.set(SessionProperties::STARTTLS_ENABLE, "true").set(
                    SessionProperties::STARTTLS_REQUIRED,
                    self.start_tls_required.to_string(),
                );
            }
            Security::None => {}
        }

        props
    }
}

/// Builder for transport configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    start_tls_required: bool,
    connect_timeout: Duration,
    io_timeout: Duration,
    credentials: Option<Credentials>,
    client_hostname: String,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::None,
            start_tls_required: false,
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            credentials: None,
            client_hostname: DEFAULT_CLIENT_HOSTNAME.to_string(),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Requires STARTTLS to succeed.
    #[must_use]
    pub const fn start_tls_required(mut self, required: bool) -> Self {
        self.start_tls_required = required;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets AUTH PLAIN credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the hostname announced in EHLO/HELO.
    #[must_use]
    pub fn client_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.client_hostname = hostname.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        TransportConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            start_tls_required: self.start_tls_required,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            credentials: self.credentials,
            client_hostname: self.client_hostname,
        }
    }
}

/// Explicitly configured transport options.
///
/// Unset fields fall back to ambient [`SessionProperties`], then to the
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Target SMTP server.
    pub host: Option<String>,
    /// Plain SMTP port (default 25).
    pub port: Option<u16>,
    /// Wrap the socket in TLS before the SMTP greeting.
    pub ssl_on_connect: Option<bool>,
    /// Port used when `ssl_on_connect` is set (default 465).
    pub ssl_port: Option<u16>,
    /// Upgrade the plaintext connection with STARTTLS.
    pub start_tls: Option<bool>,
    /// Fail when STARTTLS is not offered.
    pub start_tls_required: Option<bool>,
    /// Socket read/write timeout.
    pub socket_timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// AUTH PLAIN credentials.
    pub credentials: Option<Credentials>,
    /// Hostname announced in EHLO/HELO.
    pub client_hostname: Option<String>,
}

impl TransportOptions {
    /// Overlays every option set in `other` onto `self`.
    pub fn merge(&mut self, other: Self) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        overlay!(
            host,
            port,
            ssl_on_connect,
            ssl_port,
            start_tls,
            start_tls_required,
            socket_timeout,
            connect_timeout,
            credentials,
            client_hostname
        );
    }

    /// Resolves the host: explicit option first, then the ambient session.
    #[must_use]
    pub fn resolve_host<'a>(&'a self, ambient: &'a SessionProperties) -> Option<&'a str> {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| ambient.get_non_empty(SessionProperties::HOST))
    }

    /// Resolves these options against ambient session properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHost`] if no host is configured anywhere, or
    /// [`Error::InvalidConfig`] if an ambient property cannot be parsed or
    /// the client hostname is not a single printable ASCII word.
    pub fn resolve(&self, ambient: &SessionProperties) -> Result<TransportConfig> {
        let host = self.resolve_host(ambient).ok_or(Error::MissingHost)?;

        let ambient_ssl = ambient
            .get_non_empty(SessionProperties::SOCKET_FACTORY_CLASS)
            .is_some_and(|class| class.eq_ignore_ascii_case(SessionProperties::SSL_SOCKET_FACTORY));
        let ssl_on_connect = self.ssl_on_connect.unwrap_or(ambient_ssl);
        let start_tls = match self.start_tls {
            Some(enabled) => enabled,
            None => ambient
                .get_bool(SessionProperties::STARTTLS_ENABLE)?
                .unwrap_or(false),
        };
        let start_tls_required = match self.start_tls_required {
            Some(required) => required,
            None => ambient
                .get_bool(SessionProperties::STARTTLS_REQUIRED)?
                .unwrap_or(false),
        };

        let (security, port) = if ssl_on_connect {
            let port = match self.ssl_port {
                Some(port) => port,
                None => ambient
                    .get_port(SessionProperties::SOCKET_FACTORY_PORT)?
                    .unwrap_or(DEFAULT_SSL_PORT),
            };
            (Security::Implicit, port)
        } else {
            let port = match self.port {
                Some(port) => port,
                None => ambient
                    .get_port(SessionProperties::PORT)?
                    .unwrap_or(DEFAULT_SMTP_PORT),
            };
            let security = if start_tls {
                Security::StartTls
            } else {
                Security::None
            };
            (security, port)
        };

        let io_timeout = match self.socket_timeout {
            Some(timeout) => timeout,
            None => ambient
                .get_millis(SessionProperties::TIMEOUT)?
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        let connect_timeout = match self.connect_timeout {
            Some(timeout) => timeout,
            None => ambient
                .get_millis(SessionProperties::CONNECTION_TIMEOUT)?
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        let client_hostname = self
            .client_hostname
            .as_deref()
            .or_else(|| ambient.get_non_empty(SessionProperties::LOCALHOST))
            .unwrap_or(DEFAULT_CLIENT_HOSTNAME);
        if !is_valid_client_hostname(client_hostname) {
            return Err(Error::InvalidConfig {
                key: SessionProperties::LOCALHOST.to_string(),
                value: client_hostname.to_string(),
            });
        }

        let mut builder = TransportConfig::builder(host)
            .port(port)
            .security(security)
            .start_tls_required(start_tls_required)
            .connect_timeout(connect_timeout)
            .io_timeout(io_timeout)
            .client_hostname(client_hostname);
        if let Some(credentials) = &self.credentials {
            builder = builder.credentials(credentials.clone());
        }

        Ok(builder.build())
    }
}

/// The EHLO argument goes on the command line verbatim, so it may not
/// contain spaces, control characters or non-ASCII text.
fn is_valid_client_hostname(hostname: &str) -> bool {
    !hostname.is_empty() && hostname.bytes().all(|b| b.is_ascii_graphic())
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
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 25);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_config_new() {
        let config = TransportConfig::new("smtp.example.com");
        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 25);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.io_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.client_hostname, "localhost");
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = TransportConfig::builder("smtp.example.com")
            .security(Security::Implicit)
            .build();
        assert_eq!(config.port, 465);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("user", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_resolve_requires_host() {
        let options = TransportOptions::default();
        assert!(matches!(
            options.resolve(&SessionProperties::new()),
            Err(Error::MissingHost)
        ));

        let options = TransportOptions {
            host: Some("  ".into()),
            ..TransportOptions::default()
        };
        assert!(matches!(
            options.resolve(&SessionProperties::new()),
            Err(Error::MissingHost)
        ));
    }

    #[test]
    fn test_resolve_explicit_host_wins() {
        let ambient: SessionProperties =
            [(SessionProperties::HOST, "ambient.example.com")].into_iter().collect();
        let options = TransportOptions {
            host: Some("explicit.example.com".into()),
            ..TransportOptions::default()
        };
        assert_eq!(options.resolve(&ambient).unwrap().host, "explicit.example.com");
        assert_eq!(
            TransportOptions::default().resolve(&ambient).unwrap().host,
            "ambient.example.com"
        );
    }

    #[test]
    fn test_resolve_ssl() {
        let options = TransportOptions {
            host: Some("smtp.example.com".into()),
            ssl_on_connect: Some(true),
            ssl_port: Some(465),
            port: Some(25),
            ..TransportOptions::default()
        };
        let config = options.resolve(&SessionProperties::new()).unwrap();
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.port, 465);

        let props = config.to_properties();
        assert_eq!(props.get(SessionProperties::SOCKET_FACTORY_PORT), Some("465"));
        assert_eq!(props.get(SessionProperties::SOCKET_FACTORY_CLASS), Some("ssl"));
        assert_eq!(props.get(SessionProperties::STARTTLS_ENABLE), None);
    }

    #[test]
    fn test_resolve_start_tls() {
        let options = TransportOptions {
            host: Some("smtp.example.com".into()),
            start_tls: Some(true),
            ..TransportOptions::default()
        };
        let config = options.resolve(&SessionProperties::new()).unwrap();
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.port, 25);
        assert_eq!(
            config.to_properties().get(SessionProperties::STARTTLS_ENABLE),
            Some("true")
        );
    }

    #[test]
    fn test_resolve_timeouts_render_as_millis() {
        let options = TransportOptions {
            host: Some("smtp.example.com".into()),
            socket_timeout: Some(Duration::from_millis(5000)),
            connect_timeout: Some(Duration::from_millis(10000)),
            ..TransportOptions::default()
        };
        let props = options
            .resolve(&SessionProperties::new())
            .unwrap()
            .to_properties();
        assert_eq!(props.get(SessionProperties::TIMEOUT), Some("5000"));
        assert_eq!(props.get(SessionProperties::CONNECTION_TIMEOUT), Some("10000"));
    }

    #[test]
    fn test_resolve_falls_back_to_ambient_values() {
        let ambient: SessionProperties = [
            (SessionProperties::HOST, "ambient.example.com"),
            (SessionProperties::PORT, "2525"),
            (SessionProperties::STARTTLS_ENABLE, "true"),
            (SessionProperties::TIMEOUT, "1500"),
        ]
        .into_iter()
        .collect();
        let options = TransportOptions {
            start_tls: Some(false),
            ..TransportOptions::default()
        };

        let config = options.resolve(&ambient).unwrap();
        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.io_timeout, Duration::from_millis(1500));
        assert_eq!(config.connect_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_resolve_rejects_bad_ambient_port() {
        let ambient: SessionProperties = [
            (SessionProperties::HOST, "ambient.example.com"),
            (SessionProperties::PORT, "not-a-port"),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            TransportOptions::default().resolve(&ambient),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_client_hostname_with_line_break() {
        for hostname in ["client\r\nRSET", "client host", "h\u{f6}st"] {
            let options = TransportOptions {
                host: Some("smtp.example.com".into()),
                client_hostname: Some(hostname.into()),
                ..TransportOptions::default()
            };
            let err = options.resolve(&SessionProperties::new()).unwrap_err();
            assert!(
                matches!(&err, Error::InvalidConfig { key, .. } if key == SessionProperties::LOCALHOST),
                "{hostname:?}: {err}"
            );
        }

        let mut ambient = SessionProperties::new();
        ambient.set(SessionProperties::LOCALHOST, "evil\nQUIT");
        let options = TransportOptions {
            host: Some("smtp.example.com".into()),
            ..TransportOptions::default()
        };
        assert!(options.resolve(&ambient).unwrap_err().is_configuration());

        let options = TransportOptions {
            host: Some("smtp.example.com".into()),
            client_hostname: Some("[192.0.2.1]".into()),
            ..TransportOptions::default()
        };
        assert_eq!(options.resolve(&ambient).unwrap().client_hostname, "[192.0.2.1]");
    }

    #[test]
    fn test_merge_overlays_only_set_fields() {
        let mut options = TransportOptions {
            host: Some("a.example.com".into()),
            port: Some(2525),
            ..TransportOptions::default()
        };
        options.merge(TransportOptions {
            port: Some(587),
            start_tls: Some(true),
            ..TransportOptions::default()
        });
        assert_eq!(options.host.as_deref(), Some("a.example.com"));
        assert_eq!(options.port, Some(587));
        assert_eq!(options.start_tls, Some(true));
    }
}
