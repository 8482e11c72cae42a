//! Scripted transport for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, future, stream};

use super::{HttpVersion, OpenedRequest, RawResponse, Transport, TransportHandle};
use crate::body::BoxStream;
use crate::core::RequestHead;
use crate::error::{FetchError, Result};

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub chunks: Vec<Bytes>,
    /// Error delivered after the last chunk.
    pub error: Option<FetchError>,
    pub protocol: HttpVersion,
    /// Never deliver the response head.
    pub hang_head: bool,
    /// Stop producing chunks after the listed ones without ending the body.
    pub stall_body: bool,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            headers: Vec::new(),
            chunks: Vec::new(),
            error: None,
            protocol: HttpVersion::Http1,
            hang_head: false,
            stall_body: false,
        }
    }

    /// A `status` response redirecting to `location`.
    pub fn redirect(status: u16, location: &str) -> Self {
        Self::new(status).header("location", location)
    }

    #[must_use]
    pub fn status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    /// Send `body` split into pieces of `size` bytes.
    #[must_use]
    pub fn body_in_chunks(mut self, body: &[u8], size: usize) -> Self {
        self.chunks
            .extend(body.chunks(size.max(1)).map(Bytes::copy_from_slice));
        self
    }

    #[must_use]
    pub fn error(mut self, error: FetchError) -> Self {
        self.error = Some(error);
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: HttpVersion) -> Self {
        self.protocol = protocol;
        self
    }

    #[must_use]
    pub fn hang_head(mut self) -> Self {
        self.hang_head = true;
        self
    }

    #[must_use]
    pub fn stall_body(mut self) -> Self {
        self.stall_body = true;
        self
    }

    fn body_stream(&self, handle: TransportHandle) -> BoxStream<'static, Result<Bytes>> {
        let mut items: Vec<Result<Bytes>> = self.chunks.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.error {
            items.push(Err(error.clone()));
        }
        let stall = self.stall_body;
        let body = stream::iter(items).chain(stream::once(async move {
            if stall {
                future::pending::<()>().await;
            }
        })
        .filter_map(|()| future::ready(None::<Result<Bytes>>)));

        // A destroyed handle ends delivery the way a torn-down socket would.
        Box::pin(body.take_while(move |_| future::ready(!handle.is_destroyed())))
    }
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: RequestHead,
    /// Fully drained request body, if one was sent.
    pub body: Option<Bytes>,
}

/// Transport answering from a table of scripted responses keyed by URL.
///
/// # Examples
///
/// ```
/// use pulith_http::net::{MockResponse, MockTransport};
///
/// let transport = MockTransport::new()
///     .route("http://example.com/", MockResponse::new(200).chunk("hello"));
/// assert!(transport.requests().is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handles: Arc<Mutex<Vec<TransportHandle>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `url` with `response`.
    #[must_use]
    pub fn route(self, url: &str, response: MockResponse) -> Self {
        let key = url::Url::parse(url).map_or_else(|_| url.to_string(), String::from);
        lock(&self.routes).insert(key, response);
        self
    }

    /// Every request opened so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Handles for every opened request, in order.
    pub fn handles(&self) -> Vec<TransportHandle> {
        lock(&self.handles).clone()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("routes", &lock(&self.routes).len())
            .field("requests", &lock(&self.requests).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest> {
        let response = lock(&self.routes)
            .get(head.url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Connect(format!("no route for {}", head.url)))?;

        let sent = match body {
            Some(mut chunks) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = chunks.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Some(buf.freeze())
            }
            None => None,
        };
        lock(&self.requests).push(RecordedRequest { head, body: sent });

        let handle = TransportHandle::new();
        lock(&self.handles).push(handle.clone());

        let protocol = response.protocol;
        let body_handle = handle.clone();
        let response = async move {
            if response.hang_head {
                future::pending::<()>().await;
            }
            Ok::<_, FetchError>(RawResponse {
                status: response.status,
                status_text: response.status_text.clone(),
                headers: response.headers.clone(),
                body: response.body_stream(body_handle),
            })
        };

        Ok(OpenedRequest {
            protocol,
            response: Box::pin(response),
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::once;
    use crate::core::{OutboundDefaults, build_request_head};
    use crate::data::Headers;
    use http::Method;

    fn head(url: &str) -> RequestHead {
        build_request_head(
            &url::Url::parse(url).unwrap(),
            &Method::POST,
            &Headers::new(),
            &crate::body::Body::empty(),
            OutboundDefaults {
                user_agent: "test",
                accept_encoding: "gzip",
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scripted_response_and_recording() {
        let transport = MockTransport::new().route(
            "http://example.com",
            MockResponse::new(201).header("x-id", "1").chunk("a").chunk("b"),
        );
        let opened = transport
            .open(head("http://example.com/"), Some(once(Bytes::from_static(b"sent"))))
            .await
            .unwrap();
        assert_eq!(opened.protocol, HttpVersion::Http1);

        let raw = opened.response.await.unwrap();
        assert_eq!(raw.status, 201);
        assert_eq!(raw.status_text, "Created");
        assert_eq!(raw.headers, vec![("x-id".to_string(), "1".to_string())]);
        let chunks: Vec<_> = raw.body.collect().await;
        assert_eq!(chunks.len(), 2);

        let recorded = transport.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].body.as_deref(), Some(&b"sent"[..]));
    }

    #[tokio::test]
    async fn unknown_route_fails_to_connect() {
        let err = MockTransport::new().open(head("http://nowhere.test/"), None).await.unwrap_err();
        assert!(matches!(err, FetchError::Connect(_)));
    }

    #[tokio::test]
    async fn destroyed_handle_stops_delivery() {
        let transport = MockTransport::new().route("http://example.com/", MockResponse::new(200).chunk("a").chunk("b"));
        let opened = transport.open(head("http://example.com/"), None).await.unwrap();
        let mut raw = opened.response.await.unwrap();
        assert_eq!(raw.body.next().await.unwrap().unwrap(), "a");
        opened.handle.destroy();
        assert!(raw.body.next().await.is_none());
    }
}
