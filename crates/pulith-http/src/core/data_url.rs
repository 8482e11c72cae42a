//! Local resolution of `data:` URLs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{FetchError, Result};

/// Decoded payload of a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    /// Declared media type, e.g. `text/plain` or `text/plain;charset=utf-8`.
    pub media_type: String,
    pub data: Bytes,
}

/// Parse `data:<type/subtype>[;params][;base64],<payload>`.
///
/// # Examples
///
/// ```
/// use pulith_http::core::parse_data_url;
/// use url::Url;
///
/// let url = Url::parse("data:text/plain;base64,SGVsbG8=").unwrap();
/// let parsed = parse_data_url(&url).unwrap();
/// assert_eq!(parsed.media_type, "text/plain");
/// assert_eq!(&parsed.data[..], b"Hello");
/// ```
pub fn parse_data_url(url: &Url) -> Result<DataUrl> {
    if url.scheme() != "data" {
        return Err(FetchError::InvalidDataUrl(url.to_string()));
    }

    let raw = &url.as_str()["data:".len()..];
    let raw = raw.split_once('#').map_or(raw, |(before, _)| before);
    let (meta, payload) = raw
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidDataUrl(url.to_string()))?;

    let (media_type, base64) = match meta.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (meta, false),
    };
    if !is_media_type(media_type) {
        return Err(FetchError::InvalidDataUrl(url.to_string()));
    }

    let data = if base64 {
        let encoded: String = percent_decode_str(payload)
            .decode_utf8_lossy()
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| FetchError::InvalidDataUrl(format!("{url}: {e}")))?
    } else {
        percent_decode_str(payload).collect()
    };

    Ok(DataUrl {
        media_type: media_type.to_string(),
        data: Bytes::from(data),
    })
}

/// `type/subtype` followed by optional `;` parameters.
fn is_media_type(s: &str) -> bool {
    let essence = s.split(';').next().unwrap_or_default();
    match essence.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty() && !subtype.is_empty() && !subtype.contains('/') && !s.contains(',')
        }
        None => false,
    }
}
