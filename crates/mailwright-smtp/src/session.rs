//! String-keyed session properties.
//!
//! A [`SessionProperties`] map is both an input (ambient defaults a
//! dispatcher falls back to when a value was not set explicitly) and an
//! output (the rendered view of a resolved
//! [`TransportConfig`](crate::TransportConfig)).

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;

/// Session property map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProperties {
    values: BTreeMap<String, String>,
}

impl SessionProperties {
    /// SMTP server host.
    pub const HOST: &'static str = "smtp.host";
    /// SMTP server port.
    pub const PORT: &'static str = "smtp.port";
    /// Port the TLS socket factory connects to.
    pub const SOCKET_FACTORY_PORT: &'static str = "smtp.socket_factory.port";
    /// Socket factory kind; [`SSL_SOCKET_FACTORY`](Self::SSL_SOCKET_FACTORY)
    /// wraps the socket in TLS before the SMTP greeting.
    pub const SOCKET_FACTORY_CLASS: &'static str = "smtp.socket_factory.class";
    /// Whether the factory may fall back to a plain socket.
    pub const SOCKET_FACTORY_FALLBACK: &'static str = "smtp.socket_factory.fallback";
    /// Whether STARTTLS is attempted.
    pub const STARTTLS_ENABLE: &'static str = "smtp.starttls.enable";
    /// Whether a missing STARTTLS capability aborts the session.
    pub const STARTTLS_REQUIRED: &'static str = "smtp.starttls.required";
    /// Socket read/write timeout in milliseconds.
    pub const TIMEOUT: &'static str = "smtp.timeout";
    /// Connect timeout in milliseconds.
    pub const CONNECTION_TIMEOUT: &'static str = "smtp.connection_timeout";
    /// Whether AUTH is performed.
    pub const AUTH: &'static str = "smtp.auth";
    /// Hostname sent with EHLO/HELO.
    pub const LOCALHOST: &'static str = "smtp.localhost";

    /// Socket factory value for implicit TLS.
    pub const SSL_SOCKET_FACTORY: &'static str = "ssl";

    /// Creates an empty property map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Gets a property.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Removes a property.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Returns true if no properties are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all properties in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Gets a non-empty string property.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Gets a boolean property (`true`/`false`, case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get_non_empty(key)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(invalid(key, v)),
            })
            .transpose()
    }

    /// Gets a port property.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the value is not a valid port.
    pub fn get_port(&self, key: &str) -> Result<Option<u16>> {
        self.get_non_empty(key)
            .map(|v| v.parse::<u16>().map_err(|_| invalid(key, v)))
            .transpose()
    }

    /// Gets a duration property expressed in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the value is not a number.
    pub fn get_millis(&self, key: &str) -> Result<Option<Duration>> {
        self.get_non_empty(key)
            .map(|v| {
                v.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| invalid(key, v))
            })
            .transpose()
    }
}

impl<K, V> FromIterator<(K, V)> for SessionProperties
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn invalid(key: &str, value: &str) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let mut props = SessionProperties::new();
        props.set(SessionProperties::HOST, "smtp.example.com");
        assert_eq!(props.get(SessionProperties::HOST), Some("smtp.example.com"));
        assert_eq!(props.remove(SessionProperties::HOST).as_deref(), Some("smtp.example.com"));
        assert!(props.is_empty());
    }

    #[test]
    fn test_from_iter() {
        let props: SessionProperties = [("smtp.host", "a"), ("smtp.port", "2525")]
            .into_iter()
            .collect();
        assert_eq!(props.get_port(SessionProperties::PORT).unwrap(), Some(2525));
        assert_eq!(props.iter().count(), 2);
    }

    #[test]
    fn test_typed_getters() {
        let props: SessionProperties = [
            (SessionProperties::STARTTLS_ENABLE, "TRUE"),
            (SessionProperties::TIMEOUT, "5000"),
            (SessionProperties::HOST, "   "),
        ]
        .into_iter()
        .collect();

        assert_eq!(props.get_bool(SessionProperties::STARTTLS_ENABLE).unwrap(), Some(true));
        assert_eq!(
            props.get_millis(SessionProperties::TIMEOUT).unwrap(),
            Some(Duration::from_secs(5))
        );
        assert_eq!(props.get_non_empty(SessionProperties::HOST), None);
        assert_eq!(props.get_bool(SessionProperties::AUTH).unwrap(), None);
    }

    #[test]
    fn test_typed_getters_reject_garbage() {
        let props: SessionProperties = [
            (SessionProperties::PORT, "seventy"),
            (SessionProperties::AUTH, "yes"),
            (SessionProperties::TIMEOUT, "-1"),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            props.get_port(SessionProperties::PORT),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(props.get_bool(SessionProperties::AUTH).is_err());
        assert!(props.get_millis(SessionProperties::TIMEOUT).is_err());
    }
}
