use std::fmt;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::body::{Body, BoxStream};
use crate::error::Result;

/// Inputs a [`Body`] can be built from.
///
/// Each variant maps to exactly one extraction strategy; see
/// [`Body::from_init`].
pub enum BodyInit {
    /// Raw bytes, sent as a single chunk.
    Bytes(Bytes),

    /// UTF-8 text, sent as a single chunk.
    Text(String),

    /// Key/value pairs serialized as `application/x-www-form-urlencoded`.
    Form(Form),

    /// In-memory blob with its own MIME type.
    Blob(Blob),

    /// An existing chunk stream, passed through as is.
    Stream(BoxStream<'static, Result<Bytes>>),

    /// A raw byte reader, proxied chunk by chunk on demand.
    Reader(Box<dyn AsyncRead + Send + Unpin>),

    /// Another body, accepted only while it is still undisturbed.
    Body(Body),
}

impl BodyInit {
    /// Whether the input can only be read once.
    ///
    /// Live inputs cannot be replayed when a redirect has to be followed.
    pub fn is_live(&self) -> bool {
        match self {
            BodyInit::Stream(_) | BodyInit::Reader(_) => true,
            BodyInit::Body(body) => body.is_live(),
            _ => false,
        }
    }
}

impl fmt::Debug for BodyInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyInit::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            BodyInit::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            BodyInit::Form(form) => f.debug_tuple("Form").field(form).finish(),
            BodyInit::Blob(blob) => f.debug_tuple("Blob").field(blob).finish(),
            BodyInit::Stream(_) => f.write_str("Stream { .. }"),
            BodyInit::Reader(_) => f.write_str("Reader { .. }"),
            BodyInit::Body(body) => f.debug_tuple("Body").field(body).finish(),
        }
    }
}

impl From<Bytes> for BodyInit {
    fn from(b: Bytes) -> Self {
        BodyInit::Bytes(b)
    }
}

impl From<Vec<u8>> for BodyInit {
    fn from(v: Vec<u8>) -> Self {
        BodyInit::Bytes(Bytes::from(v))
    }
}

impl From<&'static [u8]> for BodyInit {
    fn from(s: &'static [u8]) -> Self {
        BodyInit::Bytes(Bytes::from_static(s))
    }
}

impl From<String> for BodyInit {
    fn from(s: String) -> Self {
        BodyInit::Text(s)
    }
}

impl From<&str> for BodyInit {
    fn from(s: &str) -> Self {
        BodyInit::Text(s.to_string())
    }
}

impl From<Form> for BodyInit {
    fn from(form: Form) -> Self {
        BodyInit::Form(form)
    }
}

impl From<Blob> for BodyInit {
    fn from(blob: Blob) -> Self {
        BodyInit::Blob(blob)
    }
}

impl From<Body> for BodyInit {
    fn from(body: Body) -> Self {
        BodyInit::Body(body)
    }
}

/// Immutable bytes tagged with a MIME type.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob {
    bytes: Bytes,
    content_type: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into().to_ascii_lowercase(),
        }
    }

    /// Length in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// MIME type, empty when unknown.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Sub-range `[start, end)`, clamped to the blob, keeping the MIME type.
    pub fn slice(&self, start: usize, end: usize) -> Blob {
        let end = end.min(self.bytes.len());
        let start = start.min(end);
        Blob {
            bytes: self.bytes.slice(start..end),
            content_type: self.content_type.clone(),
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("size", &self.bytes.len())
            .field("type", &self.content_type)
            .finish()
    }
}

/// Ordered key/value pairs sent as `application/x-www-form-urlencoded`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    pairs: Vec<(String, String)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Wire form, e.g. `a=1&b=hello+world`.
    pub fn serialize(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Form {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
