//! Transport backed by `reqwest`.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use super::{HttpVersion, OpenedRequest, RawResponse, Transport, TransportHandle};
use crate::body::BoxStream;
use crate::core::RequestHead;
use crate::error::{FetchError, Result};

/// Production transport using `reqwest`.
///
/// Redirects are left to the orchestrator and request bodies are buffered
/// before sending. The response head is awaited inside `open`, so the
/// connection is released by dropping the body stream.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a new ReqwestTransport with redirects disabled.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(FetchError::transport)?;
        Ok(Self { client })
    }

    /// Wrap an existing client. It should not follow redirects itself.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest> {
        let mut request = self.client.request(head.method.clone(), head.url.clone());
        for (name, values) in &head.headers {
            for value in values.values() {
                request = request.header(name.as_str(), value);
            }
        }
        if let Some(mut chunks) = body {
            let mut buf = BytesMut::new();
            while let Some(chunk) = chunks.next().await {
                buf.extend_from_slice(&chunk?);
            }
            request = request.body(buf.freeze());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Connect(e.to_string()))?;
        let protocol = if response.version() == reqwest::Version::HTTP_2 {
            HttpVersion::Http2
        } else {
            HttpVersion::Http1
        };
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();
        let raw = RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(FetchError::transport))),
        };

        Ok(OpenedRequest {
            protocol,
            response: Box::pin(async move { Ok::<_, FetchError>(raw) }),
            handle: TransportHandle::new(),
        })
    }
}
