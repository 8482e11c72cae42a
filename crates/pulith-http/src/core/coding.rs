use http::Method;

/// Decompression applied to a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCoding {
    /// Pass the body through unchanged.
    Identity,
    Gzip,
    /// zlib-wrapped or raw deflate, decided from the first byte received.
    Deflate,
    Brotli,
}

/// Pick the decoder for a response.
///
/// HEAD requests and 204/304 responses have no body to decode. Unknown
/// codings pass through untouched.
pub fn select_coding(method: &Method, status: u16, content_encoding: Option<&str>) -> ContentCoding {
    let Some(coding) = content_encoding else {
        return ContentCoding::Identity;
    };
    if *method == Method::HEAD || status == 204 || status == 304 {
        return ContentCoding::Identity;
    }

    let coding = coding.trim();
    if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
        ContentCoding::Gzip
    } else if coding.eq_ignore_ascii_case("deflate") || coding.eq_ignore_ascii_case("x-deflate") {
        ContentCoding::Deflate
    } else if cfg!(feature = "brotli") && coding.eq_ignore_ascii_case("br") {
        ContentCoding::Brotli
    } else {
        ContentCoding::Identity
    }
}

/// `Accept-Encoding` value matching the decoders compiled in.
pub fn default_accept_encoding() -> &'static str {
    if cfg!(feature = "brotli") {
        "br,gzip,deflate"
    } else {
        "gzip,deflate"
    }
}

/// Whether a zlib stream header starts with this byte.
///
/// The low nibble of the CMF byte is the compression method; 8 means
/// deflate inside a zlib wrapper.
pub fn is_zlib_header(first: u8) -> bool {
    first & 0x0F == 0x08
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_or_bodiless_passes_through() {
        assert_eq!(select_coding(&Method::GET, 200, None), ContentCoding::Identity);
        assert_eq!(select_coding(&Method::HEAD, 200, Some("gzip")), ContentCoding::Identity);
        assert_eq!(select_coding(&Method::GET, 204, Some("gzip")), ContentCoding::Identity);
        assert_eq!(select_coding(&Method::GET, 304, Some("br")), ContentCoding::Identity);
    }

    #[test]
    fn known_codings() {
        assert_eq!(select_coding(&Method::GET, 200, Some("gzip")), ContentCoding::Gzip);
        assert_eq!(select_coding(&Method::POST, 201, Some("x-gzip")), ContentCoding::Gzip);
        assert_eq!(select_coding(&Method::GET, 200, Some("deflate")), ContentCoding::Deflate);
        assert_eq!(select_coding(&Method::GET, 200, Some("x-deflate")), ContentCoding::Deflate);
        assert_eq!(select_coding(&Method::GET, 200, Some("identity")), ContentCoding::Identity);
        assert_eq!(select_coding(&Method::GET, 200, Some("zstd")), ContentCoding::Identity);
    }

    #[cfg(feature = "brotli")]
    #[test]
    fn brotli_coding() {
        assert_eq!(select_coding(&Method::GET, 200, Some("br")), ContentCoding::Brotli);
        assert_eq!(default_accept_encoding(), "br,gzip,deflate");
    }

    #[test]
    fn zlib_sniffing() {
        assert!(is_zlib_header(0x78));
        assert!(is_zlib_header(0x58));
        assert!(!is_zlib_header(0xED));
        assert!(!is_zlib_header(0x1F));
    }
}
