use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

use super::headers::Headers;
use super::init::{Blob, BodyInit};
use super::options::{ResponseInit, merge_headers};
use crate::body::{Body, BoxStream};
use crate::error::Result;

/// A received (or hand-built) HTTP response.
#[derive(Debug)]
pub struct Response {
    url: Option<Url>,
    status: u16,
    status_text: String,
    headers: Headers,
    redirects: u32,
    body: Body,
}

impl Response {
    /// Build a response from a body input.
    ///
    /// Unlike [`Request`](crate::Request), no `Content-Type` header is
    /// inferred from the body; set one through `init` when it matters.
    ///
    /// # Examples
    ///
    /// ```
    /// use pulith_http::data::{Response, ResponseInit};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let mut response = Response::new(Some("hi".into()), ResponseInit::default().status(201)).unwrap();
    /// assert!(response.ok());
    /// assert_eq!(response.text().await.unwrap(), "hi");
    /// # }
    /// ```
    pub fn new(body: Option<BodyInit>, init: ResponseInit) -> Result<Self> {
        let body = match body {
            Some(body) => Body::from_init(body)?,
            None => Body::empty(),
        };
        Self::from_body(body, init)
    }

    pub(crate) fn from_body(body: Body, init: ResponseInit) -> Result<Self> {
        let headers = merge_headers(init.headers.unwrap_or_default(), &init.extra_headers)?;
        Ok(Self {
            url: init.url,
            status: init.status,
            status_text: init.status_text,
            headers,
            redirects: init.redirects,
            body: body.with_size(init.size),
        })
    }

    /// Final URL after redirects; `None` for hand-built responses.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Whether the status is in `200..300`.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether at least one redirect was followed to get here.
    pub fn redirected(&self) -> bool {
        self.redirects > 0
    }

    /// Response type as exposed to callers; always `"default"`.
    pub fn response_type(&self) -> &'static str {
        "default"
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_used(&self) -> bool {
        self.body.body_used()
    }

    /// Body size cap; `0` means unlimited.
    pub fn size(&self) -> usize {
        self.body.size()
    }

    /// Split off an independent copy; the body is teed.
    pub fn try_clone(&mut self) -> Result<Response> {
        let body = self.body.tee()?;
        Ok(Response {
            url: self.url.clone(),
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            redirects: self.redirects,
            body,
        })
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

    /// Read the body into a [`Blob`] typed by the `Content-Type` header,
    /// falling back to the body's declared type.
    pub async fn blob(&mut self) -> Result<Blob> {
        let header_type = self.headers.get("content-type")?;
        self.body.blob_typed(header_type).await
    }

    /// Take the raw chunk stream, marking the body used.
    pub fn take_stream(&mut self) -> Result<Option<BoxStream<'static, Result<Bytes>>>> {
        self.body.take_stream()
    }
}
