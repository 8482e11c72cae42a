//! Shaping a request into what a transport puts on the wire.

use http::Method;
use url::Url;

use super::content::total_bytes;
use crate::body::Body;
use crate::data::{Headers, RawHeaderValue};
use crate::error::{FetchError, Result};

/// Request line, target and headers for one transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub url: Url,
    /// Path plus query string, e.g. `/search?q=1`.
    pub path: String,
    /// Host with the port when it is not the scheme default.
    pub host: String,
    pub hostname: String,
    /// Explicit port or the scheme default.
    pub port: u16,
    pub headers: Vec<(String, RawHeaderValue)>,
}

impl RequestHead {
    /// Whether the connection must be wrapped in TLS.
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// All values of a header, in order.
    pub fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.values())
            .collect()
    }
}

/// Defaults applied to every outgoing request.
#[derive(Debug, Clone, Copy)]
pub struct OutboundDefaults<'a> {
    pub user_agent: &'a str,
    pub accept_encoding: &'a str,
}

/// Build the head for `url`, filling in `Accept`, `Content-Length`,
/// `User-Agent` and `Accept-Encoding` where the caller left them unset.
///
/// The caller's headers are not modified.
pub fn build_request_head(
    url: &Url,
    method: &Method,
    headers: &Headers,
    body: &Body,
    defaults: OutboundDefaults<'_>,
) -> Result<RequestHead> {
    let mut headers = headers.clone();

    if !headers.has("accept")? {
        headers.set("accept", "*/*")?;
    }

    let content_length = if body.is_null() {
        matches!(*method, Method::POST | Method::PUT).then_some(0)
    } else {
        total_bytes(body)
    };
    if let Some(length) = content_length {
        headers.set("content-length", &length.to_string())?;
    }

    if !headers.has("user-agent")? {
        headers.set("user-agent", defaults.user_agent)?;
    }
    if !headers.has("accept-encoding")? {
        headers.set("accept-encoding", defaults.accept_encoding)?;
    }

    let hostname = url
        .host_str()
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
    let host = match url.port() {
        Some(explicit) => format!("{hostname}:{explicit}"),
        None => hostname.clone(),
    };
    let path = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };

    Ok(RequestHead {
        method: method.clone(),
        url: url.clone(),
        path,
        host,
        hostname,
        port,
        headers: headers.raw(),
    })
}
