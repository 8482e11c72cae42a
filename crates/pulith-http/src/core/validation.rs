use crate::error::{FetchError, Result};

/// Validate a header name against the token grammar and normalize it.
///
/// Returns the lowercased name.
///
/// # Examples
///
/// ```
/// use pulith_http::core::validate_name;
///
/// assert_eq!(validate_name("Content-Type").unwrap(), "content-type");
/// assert!(validate_name("bad name").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<String> {
    if name.is_empty() || !name.bytes().all(is_token_byte) {
        return Err(FetchError::out_of_range("name", "a valid header name", name));
    }
    Ok(name.to_ascii_lowercase())
}

/// Validate a header value and strip surrounding whitespace.
///
/// Leading and trailing spaces, tabs, carriage returns and line feeds are
/// removed. The remaining value must not contain NUL, CR or LF.
pub fn validate_value(value: &str) -> Result<String> {
    let trimmed = value.trim_matches(|c| matches!(c, '\r' | '\n' | '\t' | ' '));
    if trimmed.contains(['\0', '\r', '\n']) {
        return Err(FetchError::out_of_range("value", "a valid header value", value));
    }
    Ok(trimmed.to_string())
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

/// Returns `true` if the HTTP status code indicates a redirect.
///
/// # Recognized Redirect Codes
///
/// - 301: Moved Permanently
/// - 302: Found
/// - 303: See Other
/// - 307: Temporary Redirect
/// - 308: Permanent Redirect
///
/// # Examples
///
/// ```
/// use pulith_http::core::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(302));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(404));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}
