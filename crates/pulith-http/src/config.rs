//! Client-wide settings.

use serde::{Deserialize, Serialize};

use crate::core::default_accept_encoding;
use crate::error::{FetchError, Result};

/// Settings shared by every fetch issued through one [`Client`](crate::Client).
///
/// # Examples
///
/// ```
/// use pulith_http::ClientConfig;
///
/// let config = ClientConfig::default()
///     .user_agent("my-tool/1.0")
///     .max_redirects(10)
///     .http2(false);
/// assert_eq!(config.max_redirects, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `User-Agent` unless the request sets one.
    ///
    /// Default: `pulith-http/<version>`
    pub user_agent: String,

    /// A hop whose redirect counter exceeds this fails with
    /// [`FetchError::TooManyRedirects`].
    ///
    /// Default: 5
    pub max_redirects: u32,

    /// Offer `h2` during ALPN negotiation.
    ///
    /// Default: true
    pub http2: bool,

    /// Body size cap for requests that do not set one; `0` means unlimited.
    ///
    /// Default: 0
    pub default_size_limit: usize,

    /// Sent as `Accept-Encoding` unless the request sets one.
    ///
    /// Default: `None`, derived from the decoders compiled in.
    pub accept_encoding: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("pulith-http/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 5,
            http2: true,
            default_size_limit: 0,
            accept_encoding: None,
        }
    }
}

impl ClientConfig {
    /// Parse a configuration from TOML text. Missing keys keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use pulith_http::ClientConfig;
    ///
    /// let config = ClientConfig::from_toml_str("max_redirects = 2\nhttp2 = false").unwrap();
    /// assert_eq!(config.max_redirects, 2);
    /// assert!(!config.http2);
    /// assert!(config.user_agent.starts_with("pulith-http/"));
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| FetchError::Config(e.to_string()))
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    #[must_use]
    pub fn http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    #[must_use]
    pub fn default_size_limit(mut self, default_size_limit: usize) -> Self {
        self.default_size_limit = default_size_limit;
        self
    }

    #[must_use]
    pub fn accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
        self.accept_encoding = Some(accept_encoding.into());
        self
    }

    /// The `Accept-Encoding` value actually sent.
    pub fn effective_accept_encoding(&self) -> &str {
        self.accept_encoding
            .as_deref()
            .unwrap_or_else(|| default_accept_encoding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_redirects, 5);
        assert!(config.http2);
        assert_eq!(config.default_size_limit, 0);
        assert_eq!(config.effective_accept_encoding(), default_accept_encoding());
        assert!(config.user_agent.starts_with("pulith-http/"));
    }

    #[test]
    fn toml_overrides() {
        let config = ClientConfig::from_toml_str(
            r#"
            user_agent = "agent/2"
            default_size_limit = 1024
            accept_encoding = "gzip"
            "#,
        )
        .unwrap();
        assert_eq!(config.user_agent, "agent/2");
        assert_eq!(config.default_size_limit, 1024);
        assert_eq!(config.effective_accept_encoding(), "gzip");
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn toml_errors_are_reported() {
        let err = ClientConfig::from_toml_str("max_redirects = \"many\"").unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }
}
