use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::body::{Body, BoxStream, abortable};
use crate::config::ClientConfig;
use crate::core::{
    OutboundDefaults, RedirectAction, RedirectContext, build_request_head, decide_redirect, parse_data_url,
    select_coding,
};
use crate::data::{BodyInit, Headers, Request, RequestInit, Response, ResponseInit};
use crate::error::{FetchError, Result};
use crate::net::{HttpConnector, RawResponse, Transport, TransportHandle};
use crate::signal::AbortSignal;
use crate::transform::decode;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Drives fetches over a [`Transport`].
///
/// Each fetch builds a [`Request`], opens it through the transport, follows
/// redirects according to the request's policy and decodes the final body.
///
/// # Examples
///
/// ```no_run
/// use pulith_http::{Client, RequestInit};
///
/// # async fn run() -> pulith_http::Result<()> {
/// let client = Client::new()?;
/// let mut response = client.fetch("https://example.com/", RequestInit::default()).await?;
/// println!("{} {}", response.status(), response.text().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client<T: Transport = HttpConnector> {
    transport: T,
    config: ClientConfig,
}

impl Client<HttpConnector> {
    /// Create a client using the network connector and default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client using the network connector.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpConnector::new(&config)?;
        Ok(Self { transport, config })
    }
}

impl<T: Transport> Client<T> {
    /// Create a client over any transport.
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch `url`.
    ///
    /// # Errors
    ///
    /// - Validation errors from building the request
    /// - [`FetchError::UnsupportedProtocol`] for schemes other than `data:`, `http:`, `https:`
    /// - [`FetchError::Aborted`] when the request's signal fires before the response head
    /// - Connection, TLS and redirect errors
    pub async fn fetch(&self, url: &str, init: RequestInit) -> Result<Response> {
        let request = Request::new(url, init)?;
        self.send(request).await
    }

    /// Send an already built request.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.execute(request).await
    }

    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            match request.url().scheme() {
                "http" | "https" => {}
                "data" => return data_response(&request),
                other => {
                    return Err(FetchError::UnsupportedProtocol {
                        scheme: other.to_string(),
                    });
                }
            }
            self.attempt(request).await
        })
    }

    async fn attempt(&self, mut request: Request) -> Result<Response> {
        let signal = request.signal().cloned();
        if signal.as_ref().is_some_and(AbortSignal::is_aborted) {
            drop(request.take_body());
            return Err(FetchError::Aborted);
        }
        if request.body_used() {
            return Err(FetchError::BodyUsed);
        }

        let head = build_request_head(
            request.url(),
            request.method(),
            request.headers(),
            request.body(),
            OutboundDefaults {
                user_agent: &self.config.user_agent,
                accept_encoding: self.config.effective_accept_encoding(),
            },
        )?;
        let outgoing = outgoing_body(&mut request)?;

        let opened = with_abort(signal.as_ref(), self.transport.open(head, outgoing)).await?;
        let handle = opened.handle;
        debug!(url = %request.url(), protocol = opened.protocol.major(), "request sent");

        let raw = match with_abort(signal.as_ref(), opened.response).await {
            Ok(raw) => raw,
            Err(e) => {
                handle.destroy();
                return Err(e);
            }
        };

        let mut headers = normalize_headers(&raw);
        let location = headers.get("location")?;
        let action = {
            let ctx = RedirectContext {
                status: raw.status,
                location: location.as_deref(),
                current_url: request.url(),
                method: request.method(),
                policy: request.redirect(),
                redirects: request.redirects(),
                max_redirects: self.config.max_redirects,
                live_body: request.body().is_live(),
            };
            decide_redirect(&ctx)
        };

        let action = match action {
            Ok(action) => action,
            Err(e) => {
                handle.destroy();
                return Err(e);
            }
        };

        match action {
            RedirectAction::Deliver => {}
            RedirectAction::DeliverManual { location } => {
                headers.set("location", location.as_str())?;
            }
            RedirectAction::Follow(plan) => {
                let status = raw.status;
                drop(raw);
                handle.destroy();
                debug!(
                    status,
                    from = %request.url(),
                    to = %plan.location,
                    hop = plan.redirects,
                    "following redirect"
                );

                let mut next_headers = request.headers().clone();
                let body = if plan.drop_body || request.body().is_null() {
                    if plan.drop_body {
                        next_headers.delete("content-length")?;
                    }
                    None
                } else {
                    request.body().replay().map(BodyInit::Body)
                };
                let next = Request::from_url(
                    plan.location,
                    RequestInit {
                        method: Some(plan.method.to_string()),
                        headers: Some(next_headers),
                        body,
                        signal,
                        redirect: Some(request.redirect()),
                        size: Some(request.size()),
                        ..RequestInit::default()
                    }
                    .redirects(plan.redirects),
                )?;
                return self.execute(next).await;
            }
        }

        let size = match request.size() {
            0 => self.config.default_size_limit,
            size => size,
        };
        let encoding = headers.get("content-encoding")?;
        let coding = select_coding(request.method(), raw.status, encoding.as_deref());
        debug!(?coding, status = raw.status, "response received");

        let body = guard_body(decode(raw.body, coding), signal, handle);
        Response::from_body(
            Body::from_stream(body),
            ResponseInit {
                status: raw.status,
                status_text: raw.status_text,
                headers: Some(headers),
                url: Some(request.url().clone()),
                size,
                ..ResponseInit::default()
            }
            .redirects(request.redirects()),
        )
    }
}

/// Fetch `url` with a client using the network connector and default settings.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use pulith_http::{RequestInit, fetch};
///
/// let mut response = fetch("data:text/plain;base64,SGVsbG8=", RequestInit::default()).await.unwrap();
/// assert_eq!(response.text().await.unwrap(), "Hello");
/// # }
/// ```
pub async fn fetch(url: &str, init: RequestInit) -> Result<Response> {
    Client::new()?.fetch(url, init).await
}

/// Body to hand to the transport. Buffered bodies are copied so they can be
/// sent again on a redirect.
fn outgoing_body(request: &mut Request) -> Result<Option<BoxStream<'static, Result<Bytes>>>> {
    if request.body().is_live() {
        return request.body_mut().take_stream();
    }
    match request.body().replay() {
        Some(mut copy) => copy.take_stream(),
        None => Ok(None),
    }
}

/// A synthetic response for a `data:` URL.
fn data_response(request: &Request) -> Result<Response> {
    let parsed = parse_data_url(request.url())?;
    let mut headers = Headers::new();
    headers.set("content-type", &parsed.media_type)?;
    Response::new(
        Some(BodyInit::Bytes(parsed.data)),
        ResponseInit {
            headers: Some(headers),
            url: Some(request.url().clone()),
            size: request.size(),
            ..ResponseInit::default()
        },
    )
}

/// Build a header store from raw pairs, skipping malformed ones.
fn normalize_headers(raw: &RawResponse) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in &raw.headers {
        if let Err(e) = headers.append(name, value) {
            debug!(name = %name, error = %e, "skipping malformed response header");
        }
    }
    headers
}

/// Fail with [`FetchError::Aborted`] if `signal` fires before `fut` completes.
async fn with_abort<F, T>(signal: Option<&AbortSignal>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match signal {
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.aborted() => Err(FetchError::Aborted),
                out = fut => out,
            }
        }
        None => fut.await,
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tie the response body to the abort signal and the connection handle.
///
/// The connection is torn down as soon as the signal fires, whether or not
/// anyone is reading. The watcher lives as long as the body stream.
fn guard_body(
    body: BoxStream<'static, Result<Bytes>>,
    signal: Option<AbortSignal>,
    handle: TransportHandle,
) -> BoxStream<'static, Result<Bytes>> {
    let (body, watcher) = match signal {
        Some(signal) => {
            let target = handle.clone();
            let watched = signal.clone();
            let task = tokio::spawn(async move {
                watched.aborted().await;
                debug!("abort signalled after response head");
                target.destroy();
            });
            (abortable(body, signal), Some(AbortOnDrop(task.abort_handle())))
        }
        None => (body, None),
    };
    // The watcher is dropped together with the body, or once it ends.
    let body = stream::unfold((body, watcher), |(mut body, watcher)| async move {
        let item = body.next().await?;
        Some((item, (body, watcher)))
    });
    Box::pin(body.inspect(move |item| match item {
        Err(FetchError::Aborted) => handle.destroy(),
        Err(e) => {
            warn!(error = %e, "response body failed");
            handle.destroy();
        }
        Ok(_) => {}
    }))
}
