use std::fmt;
use std::sync::Arc;

use crate::error::{FetchError, Result};

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Configuration for TLS connections.
#[derive(Clone)]
pub struct TlsConfig {
    /// Pre-built `rustls` client configuration.
    pub client_config: Arc<rustls::ClientConfig>,
}

impl TlsConfig {
    /// Create a TLS config using the Mozilla root certificate store.
    pub fn webpki() -> Result<Self> {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
            .with_safe_default_protocol_versions()
            .map_err(|e| FetchError::Tls(format!("protocol version error: {e}")))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            client_config: Arc::new(config),
        })
    }

    /// A copy of the configuration advertising `h2` (when enabled) and
    /// `http/1.1` through ALPN.
    pub(crate) fn with_alpn(&self, http2: bool) -> Arc<rustls::ClientConfig> {
        let mut config = (*self.client_config).clone();
        config.alpn_protocols = if http2 {
            vec![ALPN_H2.to_vec(), ALPN_HTTP1.to_vec()]
        } else {
            vec![ALPN_HTTP1.to_vec()]
        };
        Arc::new(config)
    }
}

/// Build a `TlsConfig` from a pre-configured `rustls::ClientConfig`.
impl From<Arc<rustls::ClientConfig>> for TlsConfig {
    fn from(client_config: Arc<rustls::ClientConfig>) -> Self {
        Self { client_config }
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("alpn_protocols", &self.client_config.alpn_protocols)
            .finish_non_exhaustive()
    }
}

/// Protocol selected by the server during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Negotiated {
    Http1,
    H2,
}

/// Map the ALPN result to a protocol. No negotiation means HTTP/1.1.
pub(crate) fn negotiated(alpn: Option<&[u8]>) -> Result<Negotiated> {
    match alpn {
        None | Some(ALPN_HTTP1) => Ok(Negotiated::Http1),
        Some(ALPN_H2) => Ok(Negotiated::H2),
        Some(other) => Err(FetchError::UnsupportedAlpn(String::from_utf8_lossy(other).into_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webpki_config_has_roots() {
        let tls = TlsConfig::webpki().unwrap();
        assert!(tls.client_config.alpn_protocols.is_empty());

        let alpn = tls.with_alpn(true);
        assert_eq!(alpn.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
        let alpn = tls.with_alpn(false);
        assert_eq!(alpn.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn alpn_mapping() {
        assert_eq!(negotiated(None).unwrap(), Negotiated::Http1);
        assert_eq!(negotiated(Some(b"http/1.1")).unwrap(), Negotiated::Http1);
        assert_eq!(negotiated(Some(b"h2")).unwrap(), Negotiated::H2);
        assert_eq!(
            negotiated(Some(b"spdy/3")).unwrap_err().to_string(),
            "No supported ALPN protocol was negotiated, got spdy/3"
        );
    }
}
