//! A fetch-style HTTP(S) client with streaming bodies.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Headers, requests, responses and their init options
//! - [`core`] - Pure transformations: validation, redirect decisions, outbound headers
//! - [`net`] and the client - I/O behind the [`Transport`](net::Transport) trait
//!
//! # Key Features
//!
//! - **ALPN**: `https:` connections negotiate `h2` or `http/1.1` and dispatch accordingly
//! - **Single-Consumption Bodies**: bodies are streams read once, split with [`Body::tee`]
//! - **Transparent Decoding**: gzip, deflate and brotli responses are decoded while streaming
//! - **Redirects**: follow, error or manual, with a per-client hop limit
//! - **Cancellation**: an [`AbortSignal`] stops the request and any body still being read
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pulith_http::Result<()> {
//! use pulith_http::{RequestInit, fetch};
//!
//! let mut response = fetch("data:application/json,%7B%22ok%22%3Atrue%7D", RequestInit::default()).await?;
//! let value: serde_json::Value = response.json().await?;
//! assert_eq!(value["ok"], true);
//! # Ok(())
//! # }
//! ```

mod body;
pub mod config;
pub mod core;
pub mod data;
mod effects;
pub mod error;
pub mod net;
pub mod signal;
pub mod transform;

pub use body::{Body, BoxStream, StreamState};
pub use config::ClientConfig;
pub use data::{Blob, BodyInit, Form, Headers, RedirectPolicy, Request, RequestInit, Response, ResponseInit};
pub use effects::{Client, fetch};
pub use error::{FetchError, Result};
pub use net::{HttpConnector, HttpVersion, MockResponse, MockTransport, TlsConfig, Transport};
pub use signal::{AbortController, AbortSignal};

#[cfg(feature = "reqwest")]
pub use net::ReqwestTransport;
