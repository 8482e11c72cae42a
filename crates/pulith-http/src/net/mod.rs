//! Transport layer.
//!
//! The orchestrator talks to the network only through [`Transport`]. A
//! transport accepts a [`RequestHead`] and an optional body stream, and
//! hands back the negotiated protocol, a future resolving to the response
//! head, and a [`TransportHandle`] that can tear the connection down.
//!
//! # Implementations
//!
//! - [`HttpConnector`]: tokio sockets, rustls with ALPN, hyper HTTP/1.1 and HTTP/2
//! - [`MockTransport`]: scripted responses for tests
//! - `ReqwestTransport`: reqwest backend (feature `reqwest`)

mod connector;
mod mock;
#[cfg(feature = "reqwest")]
mod reqwest;
mod tls;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::AbortHandle;

use crate::body::BoxStream;
use crate::error::Result;

pub use crate::core::RequestHead;
pub use connector::HttpConnector;
pub use mock::{MockResponse, MockTransport, RecordedRequest};
#[cfg(feature = "reqwest")]
pub use reqwest::ReqwestTransport;
pub use tls::TlsConfig;

/// Protocol negotiated for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1,
    Http2,
}

impl HttpVersion {
    /// Major version number.
    pub fn major(self) -> u8 {
        match self {
            HttpVersion::Http1 => 1,
            HttpVersion::Http2 => 2,
        }
    }
}

/// Response head plus the body stream that follows it.
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    /// Header pairs as received; they have not been validated.
    pub headers: Vec<(String, String)>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Future resolving once response headers arrive.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<RawResponse>> + Send>>;

/// A request that has been handed to a transport.
pub struct OpenedRequest {
    pub protocol: HttpVersion,
    pub response: ResponseFuture,
    pub handle: TransportHandle,
}

impl fmt::Debug for OpenedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedRequest")
            .field("protocol", &self.protocol)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Tears down the tasks driving one connection.
///
/// The handle holds abort handles only, so it never keeps a connection
/// alive by itself. Clones share state.
#[derive(Clone, Default)]
pub struct TransportHandle {
    inner: Arc<HandleState>,
}

#[derive(Default)]
struct HandleState {
    tasks: Mutex<Vec<AbortHandle>>,
    destroyed: AtomicBool,
}

impl TransportHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task to abort on [`TransportHandle::destroy`].
    ///
    /// A task registered after destruction is aborted immediately.
    pub fn track(&self, task: AbortHandle) {
        if self.is_destroyed() {
            task.abort();
            return;
        }
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Abort every tracked task. Idempotent.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Sends one request over a fresh connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect, negotiate the protocol and start sending the request.
    ///
    /// Resolves once the request is on its way; the response head arrives
    /// through [`OpenedRequest::response`].
    ///
    /// # Errors
    ///
    /// Connection, TLS and ALPN failures.
    async fn open(&self, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn open(&self, head: RequestHead, body: Option<BoxStream<'static, Result<Bytes>>>) -> Result<OpenedRequest> {
        (**self).open(head, body).await
    }
}
