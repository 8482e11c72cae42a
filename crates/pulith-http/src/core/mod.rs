//! Pure transformations for HTTP fetching.
//!
//! Nothing here performs I/O: header validation, content-type inference,
//! outbound request shaping, `data:` URL decoding, content-coding selection
//! and the redirect decision all take plain values and return plain values.

mod coding;
mod content;
mod data_url;
mod outbound;
mod redirect;
mod validation;

pub use coding::{ContentCoding, default_accept_encoding, is_zlib_header, select_coding};
pub use content::{FORM_URLENCODED_UTF8, TEXT_PLAIN_UTF8, extract_content_type, total_bytes};
pub use data_url::{DataUrl, parse_data_url};
pub use outbound::{OutboundDefaults, RequestHead, build_request_head};
pub use redirect::{FollowPlan, RedirectAction, RedirectContext, decide_redirect};
pub use validation::{is_redirect, validate_name, validate_value};
