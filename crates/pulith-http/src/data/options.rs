use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::headers::Headers;
use super::init::BodyInit;
use crate::error::{FetchError, Result};
use crate::signal::AbortSignal;

/// What to do when a response asks for a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectPolicy {
    /// Issue a new request for the `Location` target.
    #[default]
    Follow,
    /// Fail the fetch with [`FetchError::RedirectBlocked`].
    Error,
    /// Return the redirect response with an absolute `Location`.
    Manual,
}

impl fmt::Display for RedirectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectPolicy::Follow => write!(f, "follow"),
            RedirectPolicy::Error => write!(f, "error"),
            RedirectPolicy::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for RedirectPolicy {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "follow" => Ok(RedirectPolicy::Follow),
            "error" => Ok(RedirectPolicy::Error),
            "manual" => Ok(RedirectPolicy::Manual),
            other => Err(FetchError::out_of_range(
                "redirect",
                "one of follow, error, manual",
                other,
            )),
        }
    }
}

/// Optional settings for building a [`Request`](super::Request).
///
/// Unset fields fall back to the source request (when building from one)
/// and then to defaults.
///
/// # Examples
///
/// ```
/// use pulith_http::data::{RedirectPolicy, RequestInit};
///
/// let init = RequestInit::default()
///     .method("post")
///     .header("Content-Type", "application/json")
///     .body(r#"{"id":1}"#)
///     .redirect(RedirectPolicy::Manual);
/// ```
#[derive(Default)]
pub struct RequestInit {
    /// HTTP method; uppercased on use. Default: `GET`.
    pub method: Option<String>,

    /// Replaces the source headers entirely.
    pub headers: Option<Headers>,

    /// Extra pairs appended after `headers`, validated when the request is built.
    pub extra_headers: Vec<(String, String)>,

    pub body: Option<BodyInit>,

    /// Cancellation signal observed for the whole fetch.
    pub signal: Option<AbortSignal>,

    /// Default: [`RedirectPolicy::Follow`].
    pub redirect: Option<RedirectPolicy>,

    /// Response body size cap in bytes; `0` means unlimited.
    pub size: Option<usize>,

    pub(crate) redirects: Option<u32>,
}

impl fmt::Debug for RequestInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInit")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("extra_headers", &self.extra_headers)
            .field("body", &self.body)
            .field("signal", &self.signal.as_ref().map(|_| "{ ... }"))
            .field("redirect", &self.redirect)
            .field("size", &self.size)
            .finish()
    }
}

impl RequestInit {
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Append one header pair.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<BodyInit>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn redirect(mut self, redirect: RedirectPolicy) -> Self {
        self.redirect = Some(redirect);
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub(crate) fn redirects(mut self, redirects: u32) -> Self {
        self.redirects = Some(redirects);
        self
    }
}

/// Settings for building a [`Response`](super::Response) by hand.
///
/// # Examples
///
/// ```
/// use pulith_http::data::ResponseInit;
///
/// let init = ResponseInit::default()
///     .status(404)
///     .status_text("Not Found")
///     .header("content-type", "text/plain");
/// ```
#[derive(Debug, Clone)]
pub struct ResponseInit {
    /// Default: 200.
    pub status: u16,

    /// Default: empty.
    pub status_text: String,

    pub headers: Option<Headers>,

    /// Extra pairs appended after `headers`.
    pub extra_headers: Vec<(String, String)>,

    /// Final URL of the request that produced the response.
    pub url: Option<Url>,

    /// Body size cap in bytes; `0` means unlimited.
    pub size: usize,

    pub(crate) redirects: u32,
}

impl Default for ResponseInit {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: String::new(),
            headers: None,
            extra_headers: Vec::new(),
            url: None,
            size: 0,
            redirects: 0,
        }
    }
}

impl ResponseInit {
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub(crate) fn redirects(mut self, redirects: u32) -> Self {
        self.redirects = redirects;
        self
    }
}

/// Merge a base header set with appended pairs.
pub(crate) fn merge_headers(base: Headers, extra: &[(String, String)]) -> Result<Headers> {
    let mut headers = base;
    for (name, value) in extra {
        headers.append(name, value)?;
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_policy_parses() {
        assert_eq!("follow".parse::<RedirectPolicy>().unwrap(), RedirectPolicy::Follow);
        assert_eq!("manual".parse::<RedirectPolicy>().unwrap(), RedirectPolicy::Manual);
        assert_eq!("error".parse::<RedirectPolicy>().unwrap(), RedirectPolicy::Error);
        assert!("FOLLOW".parse::<RedirectPolicy>().is_err());
        assert_eq!(RedirectPolicy::Manual.to_string(), "manual");
    }

    #[test]
    fn request_init_builder() {
        let init = RequestInit::default()
            .method("put")
            .header("x-a", "1")
            .header("x-a", "2")
            .size(64)
            .redirects(3);
        assert_eq!(init.method.as_deref(), Some("put"));
        assert_eq!(init.extra_headers.len(), 2);
        assert_eq!(init.size, Some(64));
        assert_eq!(init.redirects, Some(3));
        assert!(init.body.is_none());
    }

    #[test]
    fn response_init_defaults() {
        let init = ResponseInit::default();
        assert_eq!(init.status, 200);
        assert!(init.status_text.is_empty());
        assert_eq!(init.size, 0);
        assert_eq!(init.redirects, 0);
    }

    #[test]
    fn merge_validates_pairs() {
        let merged = merge_headers(Headers::new(), &[("A".into(), "1".into()), ("a".into(), "2".into())]).unwrap();
        assert_eq!(merged.get("a").unwrap().as_deref(), Some("1, 2"));

        let bad = merge_headers(Headers::new(), &[("bad name".into(), "x".into())]);
        assert!(matches!(bad, Err(FetchError::OutOfRange { .. })));
    }
}
