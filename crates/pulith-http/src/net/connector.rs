//! Network transport built on tokio, rustls and hyper.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use http::header::{HOST, HeaderName, HeaderValue};
use http::{StatusCode, Uri};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, BodyStream, Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use super::tls::{Negotiated, TlsConfig, negotiated};
use super::{HttpVersion, OpenedRequest, RawResponse, Transport, TransportHandle};
use crate::body::BoxStream;
use crate::config::ClientConfig;
use crate::core::RequestHead;
use crate::error::{FetchError, Result};

type OutgoingBody = UnsyncBoxBody<Bytes, FetchError>;

/// Opens one connection per request.
///
/// `http:` URLs use plaintext HTTP/1.1. `https:` URLs negotiate `h2` or
/// `http/1.1` through ALPN and dispatch to the matching hyper client.
#[derive(Clone)]
pub struct HttpConnector {
    tls: TlsConnector,
}

impl HttpConnector {
    /// Create a connector trusting the Mozilla root store.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::with_tls(config, TlsConfig::webpki()?))
    }

    /// Create a connector with a caller-supplied TLS configuration.
    pub fn with_tls(config: &ClientConfig, tls: TlsConfig) -> Self {
        Self {
            tls: TlsConnector::from(tls.with_alpn(config.http2)),
        }
    }

    async fn connect_tcp(head: &RequestHead) -> Result<TcpStream> {
        let host = head.hostname.trim_start_matches('[').trim_end_matches(']');
        TcpStream::connect((host, head.port))
            .await
            .map_err(|e| FetchError::Connect(format!("{}: {e}", head.host)))
    }
}

impl std::fmt::Debug for HttpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for HttpConnector {
    async fn open(&self, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest> {
        let tcp = Self::connect_tcp(&head).await?;

        if !head.is_tls() {
            // Plaintext connections speak HTTP/1.1 only.
            return open_http1(TokioIo::new(tcp), head, body).await;
        }

        let server_name = ServerName::try_from(head.hostname.trim_start_matches('[').trim_end_matches(']').to_string())
            .map_err(|e| FetchError::Tls(e.to_string()))?;
        let tls = self
            .tls
            .connect(server_name, tcp)
            .await
            .map_err(|e| FetchError::Tls(e.to_string()))?;

        let alpn = tls.get_ref().1.alpn_protocol();
        debug!(host = %head.host, alpn = ?alpn.map(String::from_utf8_lossy), "TLS handshake complete");
        match negotiated(alpn)? {
            Negotiated::Http1 => open_http1(TokioIo::new(tls), head, body).await,
            Negotiated::H2 => open_http2(TokioIo::new(tls), head, body).await,
        }
    }
}

async fn open_http1<I>(io: TokioIo<I>, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest>
where
    I: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, OutgoingBody>(io)
        .await
        .map_err(FetchError::transport)?;

    let handle = TransportHandle::new();
    let task = tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "HTTP/1.1 connection closed with error");
        }
    });
    handle.track(task.abort_handle());

    let mut request = build_request(&head, Uri::try_from(head.path.as_str()).map_err(FetchError::transport)?, body)?;
    if !request.headers().contains_key(HOST) {
        let host = HeaderValue::from_str(&head.host).map_err(FetchError::transport)?;
        request.headers_mut().insert(HOST, host);
    }

    let response = async move {
        sender.ready().await.map_err(FetchError::transport)?;
        let response = sender.send_request(request).await.map_err(FetchError::transport)?;
        let status = response.status();
        let status_text = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .unwrap_or_else(|| canonical_reason(status));
        let chunked = is_unterminated_chunked_candidate(response.headers());
        let headers = header_pairs(response.headers());
        Ok::<_, FetchError>(RawResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body: incoming_stream(response.into_body(), sender, chunked),
        })
    };

    Ok(OpenedRequest {
        protocol: HttpVersion::Http1,
        response: Box::pin(response),
        handle,
    })
}

async fn open_http2<I>(io: TokioIo<I>, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest>
where
    I: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http2::handshake::<_, _, OutgoingBody>(TokioExecutor::new(), io)
        .await
        .map_err(FetchError::transport)?;

    let handle = TransportHandle::new();
    let task = tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "HTTP/2 connection closed with error");
        }
    });
    handle.track(task.abort_handle());

    let uri = format!("{}://{}{}", head.url.scheme(), head.host, head.path);
    let request = build_request(&head, Uri::try_from(uri.as_str()).map_err(FetchError::transport)?, body)?;

    let response = async move {
        sender.ready().await.map_err(FetchError::transport)?;
        let response = sender.send_request(request).await.map_err(FetchError::transport)?;
        let status = response.status();
        let headers = header_pairs(response.headers());
        Ok::<_, FetchError>(RawResponse {
            status: status.as_u16(),
            status_text: canonical_reason(status),
            headers,
            body: incoming_stream(response.into_body(), sender, false),
        })
    };

    Ok(OpenedRequest {
        protocol: HttpVersion::Http2,
        response: Box::pin(response),
        handle,
    })
}

fn build_request(
    head: &RequestHead,
    uri: Uri,
    body: Option<BoxStream<'static, Result<Bytes>>>,
) -> Result<http::Request<OutgoingBody>> {
    let mut request = http::Request::new(outgoing_body(body));
    *request.method_mut() = head.method.clone();
    *request.uri_mut() = uri;

    let headers = request.headers_mut();
    for (name, values) in &head.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::out_of_range("name", "a valid HTTP header name", name.as_str()))?;
        for value in values.values() {
            let value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|_| FetchError::out_of_range("value", "a valid HTTP header value", value))?;
            headers.append(name.clone(), value);
        }
    }
    Ok(request)
}

fn outgoing_body(body: Option<BoxStream<'static, Result<Bytes>>>) -> OutgoingBody {
    match body {
        Some(chunks) => StreamBody::new(chunks.map(|chunk| chunk.map(Frame::data))).boxed_unsync(),
        None => Empty::<Bytes>::new()
            .map_err(|never: Infallible| -> FetchError { match never {} })
            .boxed_unsync(),
    }
}

fn canonical_reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

fn header_pairs(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect()
}

/// Chunked responses without `Content-Length` must end with a zero-length
/// chunk; losing the connection before it is a premature close.
fn is_unterminated_chunked_candidate(headers: &http::HeaderMap) -> bool {
    let chunked = headers
        .get_all(http::header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|coding| coding.trim().eq_ignore_ascii_case("chunked")));
    chunked && !headers.contains_key(http::header::CONTENT_LENGTH)
}

/// The connection ended before the body was complete.
fn is_premature_close(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::UnexpectedEof)
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Body chunks from hyper. `keep_alive` is held until the body ends.
fn incoming_stream<K>(body: Incoming, keep_alive: K, chunked: bool) -> BoxStream<'static, Result<Bytes>>
where
    K: Send + 'static,
{
    Box::pin(stream::unfold(
        Some((BodyStream::new(body), keep_alive)),
        move |state| async move {
            let (mut frames, keep_alive) = state?;
            loop {
                match frames.next().await {
                    Some(Ok(frame)) => match frame.into_data() {
                        Ok(data) if data.is_empty() => continue,
                        Ok(data) => return Some((Ok(data), Some((frames, keep_alive)))),
                        Err(_trailers) => continue,
                    },
                    Some(Err(e)) if chunked && is_premature_close(&e) => {
                        warn!("connection closed before the final chunk");
                        return Some((Err(FetchError::PrematureClose), None));
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "response body failed");
                        return Some((Err(FetchError::transport(e)), None));
                    }
                    None => return None,
                }
            }
        },
    ))
}
