use crate::body::Body;
use crate::data::BodyInit;

pub const TEXT_PLAIN_UTF8: &str = "text/plain;charset=UTF-8";
pub const FORM_URLENCODED_UTF8: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// Infer the `Content-Type` implied by a body input.
///
/// Binary and stream inputs carry no type. A body input keeps whatever type
/// it declared. Everything else is sent as UTF-8 text.
pub fn extract_content_type(init: &BodyInit) -> Option<String> {
    match init {
        BodyInit::Text(_) => Some(TEXT_PLAIN_UTF8.to_string()),
        BodyInit::Form(_) => Some(FORM_URLENCODED_UTF8.to_string()),
        BodyInit::Body(body) => body.content_type().map(str::to_string),
        BodyInit::Bytes(_) | BodyInit::Stream(_) | BodyInit::Reader(_) => None,
        BodyInit::Blob(_) => Some(TEXT_PLAIN_UTF8.to_string()),
    }
}

/// Byte length that can be advertised before sending.
///
/// A null body counts as zero bytes; buffers and blobs report their size;
/// anything read lazily has no length.
pub fn total_bytes(body: &Body) -> Option<u64> {
    if body.is_null() {
        return Some(0);
    }
    body.known_length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Blob, Form};
    use bytes::Bytes;

    #[test]
    fn inferred_types() {
        assert_eq!(extract_content_type(&"hi".into()).as_deref(), Some(TEXT_PLAIN_UTF8));
        assert_eq!(
            extract_content_type(&Form::new().pair("a", "1").into()).as_deref(),
            Some(FORM_URLENCODED_UTF8)
        );
        assert_eq!(extract_content_type(&Bytes::from_static(b"\x00").into()), None);
        assert_eq!(
            extract_content_type(&Blob::new(Bytes::new(), "image/png").into()).as_deref(),
            Some(TEXT_PLAIN_UTF8)
        );
    }

    #[test]
    fn body_input_keeps_declared_type() {
        let typed = Body::from_init(Blob::new(&b"x"[..], "image/gif").into()).unwrap();
        assert_eq!(extract_content_type(&typed.into()).as_deref(), Some("image/gif"));

        let untyped = Body::from_init(Bytes::from_static(b"x").into()).unwrap();
        assert_eq!(extract_content_type(&untyped.into()), None);
    }

    #[test]
    fn lengths() {
        assert_eq!(total_bytes(&Body::empty()), Some(0));
        assert_eq!(total_bytes(&Body::from_init(vec![0u8; 12].into()).unwrap()), Some(12));
        assert_eq!(
            total_bytes(&Body::from_init(Blob::new(&b"abcd"[..], "").into()).unwrap()),
            Some(4)
        );
        assert_eq!(total_bytes(&Body::from_init("text".into()).unwrap()), None);
    }
}
