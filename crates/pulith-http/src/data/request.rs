use bytes::Bytes;
use http::Method;
use serde::de::DeserializeOwned;
use url::Url;

use super::headers::Headers;
use super::init::Blob;
use super::options::{RedirectPolicy, RequestInit, merge_headers};
use crate::body::{Body, BoxStream};
use crate::core::extract_content_type;
use crate::error::{FetchError, Result};
use crate::signal::AbortSignal;

/// An outgoing HTTP request.
///
/// The URL, method, headers and policy are fixed at construction. The body
/// can be read once, or split with [`Request::try_clone`] beforehand.
#[derive(Debug)]
pub struct Request {
    url: Url,
    method: Method,
    headers: Headers,
    signal: Option<AbortSignal>,
    redirect: RedirectPolicy,
    redirects: u32,
    body: Body,
}

impl Request {
    /// Build a request for an absolute URL string.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] when `url` does not parse
    /// - [`FetchError::InvalidMethod`] for a malformed method
    /// - [`FetchError::BodyNotAllowed`] for GET/HEAD with a body
    /// - [`FetchError::OutOfRange`] for an invalid header pair
    ///
    /// # Examples
    ///
    /// ```
    /// use pulith_http::data::{Request, RequestInit};
    ///
    /// let request = Request::new("https://example.com/upload", RequestInit::default()
    ///     .method("post")
    ///     .body("hello")).unwrap();
    /// assert_eq!(request.method().as_str(), "POST");
    /// assert_eq!(
    ///     request.headers().get("content-type").unwrap().as_deref(),
    ///     Some("text/plain;charset=UTF-8"),
    /// );
    /// ```
    pub fn new(url: &str, init: RequestInit) -> Result<Self> {
        Self::from_url(Url::parse(url)?, init)
    }

    /// Build a request for an already parsed URL.
    pub fn from_url(url: Url, init: RequestInit) -> Result<Self> {
        let method = parse_method(init.method.as_deref().unwrap_or("GET"))?;
        let headers = init.headers.unwrap_or_default();
        Self::assemble(url, method, headers, init.extra_headers, init.body, Body::empty(), Parts {
            signal: init.signal,
            redirect: init.redirect.unwrap_or_default(),
            redirects: init.redirects.unwrap_or(0),
            size: init.size.unwrap_or(0),
        })
    }

    /// Build a request from another one, overriding fields set in `init`.
    ///
    /// When `init` has no body, the source body is teed so both requests
    /// can send it.
    pub fn from_request(source: &mut Request, init: RequestInit) -> Result<Self> {
        let method = match init.method.as_deref() {
            Some(method) => parse_method(method)?,
            None => source.method.clone(),
        };
        let inherited = if init.body.is_none() && !source.body.is_null() {
            if method == Method::GET || method == Method::HEAD {
                return Err(FetchError::BodyNotAllowed {
                    method: method.to_string(),
                });
            }
            source.body.tee()?
        } else {
            Body::empty()
        };
        let headers = init.headers.unwrap_or_else(|| source.headers.clone());
        let size = match init.size {
            Some(size) if size > 0 => size,
            _ => source.body.size(),
        };
        Self::assemble(source.url.clone(), method, headers, init.extra_headers, init.body, inherited, Parts {
            signal: init.signal.or_else(|| source.signal.clone()),
            redirect: init.redirect.unwrap_or(source.redirect),
            redirects: init.redirects.unwrap_or(source.redirects),
            size,
        })
    }

    fn assemble(
        url: Url,
        method: Method,
        headers: Headers,
        extra_headers: Vec<(String, String)>,
        body_init: Option<super::BodyInit>,
        inherited: Body,
        parts: Parts,
    ) -> Result<Self> {
        if body_init.is_some() && (method == Method::GET || method == Method::HEAD) {
            return Err(FetchError::BodyNotAllowed {
                method: method.to_string(),
            });
        }

        let mut headers = merge_headers(headers, &extra_headers)?;
        let body = match body_init {
            Some(init) => {
                let content_type = extract_content_type(&init);
                let body = Body::from_init(init)?;
                if let Some(content_type) = content_type
                    && !headers.has("content-type")?
                {
                    headers.append("content-type", &content_type)?;
                }
                body
            }
            None => inherited,
        };

        Ok(Self {
            url,
            method,
            headers,
            signal: parts.signal,
            redirect: parts.redirect,
            redirects: parts.redirects,
            body: body.with_size(parts.size),
        })
    }

    /// Split off an independent copy; the body is teed.
    pub fn try_clone(&mut self) -> Result<Request> {
        let body = self.body.tee()?;
        Ok(Request {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            signal: self.signal.clone(),
            redirect: self.redirect,
            redirects: self.redirects,
            body,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn redirect(&self) -> RedirectPolicy {
        self.redirect
    }

    pub fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }

    /// Response body size cap; `0` means unlimited.
    pub fn size(&self) -> usize {
        self.body.size()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_used(&self) -> bool {
        self.body.body_used()
    }

    pub(crate) fn redirects(&self) -> u32 {
        self.redirects
    }

    pub(crate) fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub(crate) fn take_body(&mut self) -> Body {
        let size = self.size();
        std::mem::take(&mut self.body).with_size(size)
    }

    pub async fn bytes(&mut self) -> Result<Bytes> {
        self.body.bytes().await
    }

    pub async fn text(&mut self) -> Result<String> {
        self.body.text().await
    }

    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        self.body.json().await
    }

    /// Read the body into a [`Blob`] typed by the `Content-Type` header.
    pub async fn blob(&mut self) -> Result<Blob> {
        let header_type = self.headers.get("content-type")?;
        self.body.blob_typed(header_type).await
    }

    /// Take the raw chunk stream, marking the body used.
    pub fn take_stream(&mut self) -> Result<Option<BoxStream<'static, Result<Bytes>>>> {
        self.body.take_stream()
    }
}

struct Parts {
    signal: Option<AbortSignal>,
    redirect: RedirectPolicy,
    redirects: u32,
    size: usize,
}

fn parse_method(method: &str) -> Result<Method> {
    let upper = method.to_ascii_uppercase();
    Method::from_bytes(upper.as_bytes()).map_err(|_| FetchError::InvalidMethod(method.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Form;
    use crate::signal::AbortController;

    #[test]
    fn defaults() {
        let request = Request::new("http://example.com/path", RequestInit::default()).unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.redirect(), RedirectPolicy::Follow);
        assert_eq!(request.size(), 0);
        assert_eq!(request.redirects(), 0);
        assert!(request.body().is_null());
        assert!(request.headers().is_empty());
        assert!(request.signal().is_none());
    }

    #[test]
    fn method_is_uppercased() {
        let request = Request::new("http://example.com/", RequestInit::default().method("patch")).unwrap();
        assert_eq!(request.method().as_str(), "PATCH");

        let err = Request::new("http://example.com/", RequestInit::default().method("bad method")).unwrap_err();
        assert!(matches!(err, FetchError::InvalidMethod(_)));
    }

    #[test]
    fn invalid_url_fails() {
        let err = Request::new("not a url", RequestInit::default()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn get_and_head_reject_bodies() {
        for method in ["GET", "head"] {
            let err = Request::new("http://example.com/", RequestInit::default().method(method).body("x")).unwrap_err();
            assert!(matches!(err, FetchError::BodyNotAllowed { .. }));
        }
    }

    #[test]
    fn content_type_is_inferred_unless_set() {
        let form = Request::new(
            "http://example.com/",
            RequestInit::default().method("POST").body(Form::new().pair("a", "1")),
        )
        .unwrap();
        assert_eq!(
            form.headers().get("content-type").unwrap().as_deref(),
            Some("application/x-www-form-urlencoded;charset=UTF-8")
        );

        let explicit = Request::new(
            "http://example.com/",
            RequestInit::default()
                .method("POST")
                .header("Content-Type", "application/json")
                .body("{}"),
        )
        .unwrap();
        assert_eq!(
            explicit.headers().get_all("content-type").unwrap(),
            ["application/json".to_string()]
        );

        let binary = Request::new(
            "http://example.com/",
            RequestInit::default().method("POST").body(vec![1u8, 2]),
        )
        .unwrap();
        assert!(!binary.headers().has("content-type").unwrap());
    }

    #[test]
    fn bad_header_fails_construction() {
        let err = Request::new("http://example.com/", RequestInit::default().header("x", "a\nb")).unwrap_err();
        assert!(matches!(err, FetchError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn clone_tees_body() {
        let controller = AbortController::new();
        let mut original = Request::new(
            "http://example.com/",
            RequestInit::default()
                .method("POST")
                .body("payload")
                .signal(controller.signal())
                .redirect(RedirectPolicy::Manual)
                .size(100),
        )
        .unwrap();
        let mut copy = original.try_clone().unwrap();

        assert_eq!(copy.url(), original.url());
        assert_eq!(copy.redirect(), RedirectPolicy::Manual);
        assert_eq!(copy.size(), 100);
        assert!(copy.signal().is_some());
        assert_eq!(original.text().await.unwrap(), "payload");
        assert_eq!(copy.text().await.unwrap(), "payload");
        assert!(original.try_clone().is_err());
    }

    #[tokio::test]
    async fn from_request_overrides_and_inherits() {
        let mut source = Request::new(
            "http://example.com/a",
            RequestInit::default().method("PUT").header("x-a", "1").body("body"),
        )
        .unwrap();
        let mut derived = Request::from_request(&mut source, RequestInit::default().redirects(2)).unwrap();
        assert_eq!(derived.method(), Method::PUT);
        assert_eq!(derived.headers().get("x-a").unwrap().as_deref(), Some("1"));
        assert_eq!(derived.redirects(), 2);
        assert_eq!(derived.text().await.unwrap(), "body");
        assert_eq!(source.text().await.unwrap(), "body");

        let mut source = Request::new("http://example.com/a", RequestInit::default().method("POST").body("b")).unwrap();
        let err = Request::from_request(&mut source, RequestInit::default().method("GET")).unwrap_err();
        assert!(matches!(err, FetchError::BodyNotAllowed { .. }));
    }

    #[tokio::test]
    async fn blob_uses_header_type() {
        let mut request = Request::new(
            "http://example.com/",
            RequestInit::default()
                .method("POST")
                .header("content-type", "application/octet-stream")
                .body("x"),
        )
        .unwrap();
        assert_eq!(request.blob().await.unwrap().content_type(), "application/octet-stream");
        assert!(request.body_used());
    }
}
