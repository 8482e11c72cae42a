//! Value types for HTTP messages.
//!
//! Headers, body inputs, construction options and the [`Request`] and
//! [`Response`] entities. Apart from reading a body once, these types are
//! fixed after construction.

pub mod headers;
pub mod init;
pub mod options;
pub mod request;
pub mod response;

pub use headers::{Headers, RawHeaderValue};
pub use init::{Blob, BodyInit, Form};
pub use options::{RedirectPolicy, RequestInit, ResponseInit};
pub use request::Request;
pub use response::Response;
