//! Single-consumption message bodies.
//!
//! A [`Body`] wraps a lazy chunk stream. The first consuming call marks it
//! disturbed; every later one fails with [`FetchError::BodyUsed`]. Before that
//! point the body can be split with [`Body::tee`] so two readers see the same
//! bytes.

mod stream;
mod tee;

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::data::{Blob, BodyInit};
use crate::error::{FetchError, Result};

pub(crate) use stream::{abortable, once, reader_stream};

/// A boxed stream type for message bodies.
///
/// This type alias simplifies the complex stream type used throughout the crate.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Lifecycle of the underlying stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// More chunks may follow.
    Active,
    /// The stream ended normally.
    Closed,
    /// The stream failed; the error is replayed to later readers.
    Errored(FetchError),
}

#[derive(Clone)]
enum Source {
    Null,
    /// Bytes known up front, so the body can be sent again.
    Buffered(Bytes),
    Live,
}

/// A byte stream that can be consumed exactly once.
pub struct Body {
    stream: Option<BoxStream<'static, Result<Bytes>>>,
    source: Source,
    state: StreamState,
    disturbed: bool,
    size: usize,
    length: Option<u64>,
    content_type: Option<String>,
}

impl Body {
    /// A body with no content.
    pub fn empty() -> Self {
        Self {
            stream: None,
            source: Source::Null,
            state: StreamState::Closed,
            disturbed: false,
            size: 0,
            length: None,
            content_type: None,
        }
    }

    /// Wrap an existing chunk stream.
    pub fn from_stream(stream: BoxStream<'static, Result<Bytes>>) -> Self {
        Self::live(stream)
    }

    /// Extract a body from any supported input.
    ///
    /// Fails with [`FetchError::BodyUsed`] when given a [`Body`] that has
    /// already been read.
    pub fn from_init(init: BodyInit) -> Result<Self> {
        let body = match init {
            BodyInit::Bytes(bytes) => {
                let length = bytes.len() as u64;
                Self::buffered(bytes).with_length(length)
            }
            BodyInit::Text(text) => Self::buffered(Bytes::from(text)),
            BodyInit::Form(form) => Self::buffered(Bytes::from(form.serialize())),
            BodyInit::Blob(blob) => {
                let length = blob.size() as u64;
                let declared = blob.content_type().to_string();
                let mut body = Self::buffered(blob.bytes()).with_length(length);
                body.content_type = (!declared.is_empty()).then_some(declared);
                body
            }
            BodyInit::Stream(stream) => Self::live(stream),
            BodyInit::Reader(reader) => Self::live(reader_stream(reader)),
            BodyInit::Body(mut other) => {
                if other.disturbed {
                    return Err(FetchError::BodyUsed);
                }
                // Buffered content stays replayable and keeps its length.
                Self {
                    stream: other.stream.take(),
                    source: std::mem::replace(&mut other.source, Source::Null),
                    state: other.state.clone(),
                    length: other.length,
                    content_type: other.content_type.take(),
                    ..Self::empty()
                }
            }
        };
        Ok(body)
    }

    fn buffered(bytes: Bytes) -> Self {
        Self {
            stream: Some(once(bytes.clone())),
            source: Source::Buffered(bytes),
            state: StreamState::Active,
            ..Self::empty()
        }
    }

    fn live(stream: BoxStream<'static, Result<Bytes>>) -> Self {
        Self {
            stream: Some(stream),
            source: Source::Live,
            state: StreamState::Active,
            ..Self::empty()
        }
    }

    fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    /// Limit the number of bytes a consumer may read; `0` means unlimited.
    pub(crate) fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub(crate) fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Whether a consumer has already started reading.
    pub fn body_used(&self) -> bool {
        self.disturbed
    }

    /// Maximum number of bytes a consumer may read; `0` means unlimited.
    pub fn size(&self) -> usize {
        self.size
    }

    /// MIME type declared by the input, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Whether the body was created without content.
    pub fn is_null(&self) -> bool {
        matches!(self.source, Source::Null)
    }

    pub fn state(&self) -> &StreamState {
        &self.state
    }

    /// Byte length known before reading, for buffers and blobs only.
    pub(crate) fn known_length(&self) -> Option<u64> {
        self.length
    }

    /// Whether the content can only be read once.
    pub(crate) fn is_live(&self) -> bool {
        matches!(self.source, Source::Live)
    }

    /// A fresh copy of the content when it was known up front.
    pub(crate) fn replay(&self) -> Option<Body> {
        match &self.source {
            Source::Buffered(bytes) => {
                let mut body = Self::buffered(bytes.clone());
                body.length = self.length;
                body.content_type = self.content_type.clone();
                body.size = self.size;
                Some(body)
            }
            Source::Null => Some(Self::empty().with_size(self.size)),
            Source::Live => None,
        }
    }

    /// Take the raw stream, marking the body disturbed.
    ///
    /// Returns `Ok(None)` for a null body.
    pub fn take_stream(&mut self) -> Result<Option<BoxStream<'static, Result<Bytes>>>> {
        self.begin()?;
        Ok(self.stream.take())
    }

    /// Split the body so another reader can consume the same bytes.
    ///
    /// `self` keeps one branch and the returned body gets the other.
    pub fn tee(&mut self) -> Result<Body> {
        if self.disturbed {
            return Err(FetchError::BodyUsed);
        }
        let branch = match self.stream.take() {
            Some(stream) => {
                let (mine, theirs) = tee::tee(stream);
                self.stream = Some(mine);
                Some(theirs)
            }
            None => None,
        };
        Ok(Body {
            stream: branch,
            source: self.source.clone(),
            state: self.state.clone(),
            disturbed: false,
            size: self.size,
            length: self.length,
            content_type: self.content_type.clone(),
        })
    }

    fn begin(&mut self) -> Result<()> {
        if self.disturbed {
            return Err(FetchError::BodyUsed);
        }
        self.disturbed = true;
        if let StreamState::Errored(err) = &self.state {
            return Err(err.clone());
        }
        Ok(())
    }

    /// Drain the whole stream into one buffer, enforcing the size cap.
    async fn consume(&mut self) -> Result<Bytes> {
        self.begin()?;
        let Some(mut stream) = self.stream.take() else {
            return Ok(Bytes::new());
        };

        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    self.state = StreamState::Errored(err.clone());
                    return Err(err);
                }
            };
            if self.size > 0 && buf.len() + chunk.len() > self.size {
                let err = FetchError::out_of_range(
                    "body",
                    format!("<= {}", self.size),
                    (buf.len() + chunk.len()).to_string(),
                );
                drop(stream);
                self.state = StreamState::Errored(err.clone());
                return Err(err);
            }
            buf.extend_from_slice(&chunk);
        }
        self.state = StreamState::Closed;
        Ok(buf.freeze())
    }

    /// Read the full body as raw bytes.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        self.consume().await
    }

    /// Read the full body as text, replacing invalid UTF-8.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.consume().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read the full body and parse it as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let bytes = self.consume().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the full body into a [`Blob`] typed with the declared MIME type.
    pub async fn blob(&mut self) -> Result<Blob> {
        self.blob_typed(None).await
    }

    /// Like [`Body::blob`], preferring `header_type` when present.
    pub(crate) async fn blob_typed(&mut self, header_type: Option<String>) -> Result<Blob> {
        let bytes = self.consume().await?;
        let content_type = header_type
            .filter(|t| !t.is_empty())
            .or_else(|| self.content_type.clone())
            .unwrap_or_default();
        Ok(Blob::new(bytes, content_type))
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("used", &self.disturbed)
            .field("state", &self.state)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
