//! Stream transformations for HTTP fetching.
//!
//! Content decoding applied between the transport stream and the response
//! body. Decoder failures surface as errors on the body stream itself.

mod decompress;

#[cfg(feature = "brotli")]
pub use decompress::BrotliDecoder;
pub use decompress::{
    GzipDecoder, InflateDecoder, SharedSink, StreamTransform, decode, decoder_for, transform_stream,
};
