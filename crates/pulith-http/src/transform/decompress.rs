//! Stream decompression functionality.
//!
//! Decoders are push-based: each network chunk goes in, whatever output it
//! completes comes out, so decoding never waits for the whole body.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use flate2::write::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use futures_util::{StreamExt, stream};
use tracing::{debug, trace};

use crate::body::BoxStream;
use crate::core::{ContentCoding, is_zlib_header};
use crate::error::{FetchError, Result};

const OUTPUT_RESERVE: usize = 32 * 1024;

/// Incremental byte transform applied to a body stream.
pub trait StreamTransform: Send {
    /// Feed one chunk and return the output it completes.
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>>;

    /// Signal end of input and return any remaining output.
    fn finish(&mut self) -> Result<Vec<u8>>;
}

/// Gzip decoder that flushes after every chunk.
///
/// A truncated trailer or bytes after the end of the member are tolerated.
pub struct GzipDecoder {
    inner: GzDecoder<Vec<u8>>,
    ended: bool,
}

impl GzipDecoder {
    pub fn new() -> Self {
        Self {
            inner: GzDecoder::new(Vec::new()),
            ended: false,
        }
    }

    fn drain(&mut self) -> Vec<u8> {
        std::mem::take(self.inner.get_mut())
    }
}

impl Default for GzipDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransform for GzipDecoder {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut rest = input;
        while !rest.is_empty() && !self.ended {
            match self.inner.write(rest) {
                Ok(0) => {
                    trace!(ignored = rest.len(), "bytes after end of gzip member");
                    self.ended = true;
                }
                Ok(n) => rest = &rest[n..],
                Err(e) => return Err(FetchError::transport(e)),
            }
        }
        self.inner.flush().map_err(FetchError::transport)?;
        Ok(self.drain())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if let Err(e) = self.inner.try_finish() {
            debug!(error = %e, "gzip stream ended early");
        }
        Ok(self.drain())
    }
}

/// zlib or raw deflate, chosen from the first byte received.
pub struct InflateDecoder {
    inner: Option<Decompress>,
    seen_input: bool,
    ended: bool,
}

impl InflateDecoder {
    pub fn new() -> Self {
        Self {
            inner: None,
            seen_input: false,
            ended: false,
        }
    }
}

impl Default for InflateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamTransform for InflateDecoder {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let Some(&first) = input.first() else {
            return Ok(Vec::new());
        };
        self.seen_input = true;
        let inner = self.inner.get_or_insert_with(|| {
            let zlib = is_zlib_header(first);
            debug!(zlib, "deflate framing detected");
            Decompress::new(zlib)
        });

        let mut out = Vec::new();
        let mut rest = input;
        while !self.ended {
            out.reserve(OUTPUT_RESERVE);
            let (in_before, out_before) = (inner.total_in(), inner.total_out());
            let status = inner
                .decompress_vec(rest, &mut out, FlushDecompress::None)
                .map_err(FetchError::transport)?;
            let consumed = (inner.total_in() - in_before) as usize;
            let produced = inner.total_out() - out_before;
            rest = &rest[consumed..];

            if status == Status::StreamEnd {
                self.ended = true;
            } else if rest.is_empty() && out.len() < out.capacity() {
                break;
            } else if consumed == 0 && produced == 0 {
                break;
            }
        }
        Ok(out)
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        if self.seen_input && !self.ended {
            return Err(FetchError::Transport("unexpected end of file".into()));
        }
        Ok(Vec::new())
    }
}

/// Brotli decoder.
#[cfg(feature = "brotli")]
pub struct BrotliDecoder {
    inner: brotli::DecompressorWriter<SharedSink>,
    sink: SharedSink,
}

#[cfg(feature = "brotli")]
impl BrotliDecoder {
    pub fn new() -> Self {
        let sink = SharedSink::default();
        Self {
            inner: brotli::DecompressorWriter::new(sink.clone(), 4096),
            sink,
        }
    }
}

#[cfg(feature = "brotli")]
impl Default for BrotliDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "brotli")]
impl StreamTransform for BrotliDecoder {
    fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.inner.write_all(input).map_err(FetchError::transport)?;
        Ok(self.sink.take())
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        self.inner.close().map_err(FetchError::transport)?;
        Ok(self.sink.take())
    }
}

/// Output buffer shared between a writer-style decoder and its owner.
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The transform for a content coding, or `None` to pass bytes through.
pub fn decoder_for(coding: ContentCoding) -> Option<Box<dyn StreamTransform>> {
    match coding {
        ContentCoding::Identity => None,
        ContentCoding::Gzip => Some(Box::new(GzipDecoder::new())),
        ContentCoding::Deflate => Some(Box::new(InflateDecoder::new())),
        #[cfg(feature = "brotli")]
        ContentCoding::Brotli => Some(Box::new(BrotliDecoder::new())),
        #[cfg(not(feature = "brotli"))]
        ContentCoding::Brotli => None,
    }
}

/// Apply `transform` to every chunk of `source`.
///
/// Errors from the source or the decoder end the stream.
pub fn transform_stream(
    source: BoxStream<'static, Result<Bytes>>,
    transform: Box<dyn StreamTransform>,
) -> BoxStream<'static, Result<Bytes>> {
    Box::pin(stream::unfold(
        Some((source, transform)),
        |state| async move {
            let (mut source, mut transform) = state?;
            loop {
                match source.next().await {
                    Some(Ok(chunk)) => match transform.transform(&chunk) {
                        Ok(out) if out.is_empty() => continue,
                        Ok(out) => return Some((Ok(Bytes::from(out)), Some((source, transform)))),
                        Err(e) => return Some((Err(e), None)),
                    },
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => {
                        return match transform.finish() {
                            Ok(out) if out.is_empty() => None,
                            Ok(out) => Some((Ok(Bytes::from(out)), None)),
                            Err(e) => Some((Err(e), None)),
                        };
                    }
                }
            }
        },
    ))
}

/// Decode `source` according to `coding`.
pub fn decode(source: BoxStream<'static, Result<Bytes>>, coding: ContentCoding) -> BoxStream<'static, Result<Bytes>> {
    match decoder_for(coding) {
        Some(transform) => transform_stream(source, transform),
        None => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};

    const TEXT: &str = "the quick brown fox jumps over the lazy dog. the quick brown fox jumps over the lazy dog.";

    fn compress<W: Write>(mut encoder: W, finish: impl FnOnce(W) -> Vec<u8>) -> Vec<u8> {
        encoder.write_all(TEXT.as_bytes()).unwrap();
        finish(encoder)
    }

    fn gzip() -> Vec<u8> {
        compress(GzEncoder::new(Vec::new(), Compression::default()), |e| e.finish().unwrap())
    }

    fn zlib() -> Vec<u8> {
        compress(ZlibEncoder::new(Vec::new(), Compression::default()), |e| e.finish().unwrap())
    }

    fn raw_deflate() -> Vec<u8> {
        compress(DeflateEncoder::new(Vec::new(), Compression::default()), |e| e.finish().unwrap())
    }

    fn chunks(data: &[u8], size: usize) -> BoxStream<'static, Result<Bytes>> {
        let items: Vec<Result<Bytes>> = data.chunks(size).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(mut s: BoxStream<'static, Result<Bytes>>) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn gzip_across_chunk_boundaries() {
        let data = gzip();
        for size in [1, 3, 7, data.len()] {
            let out = collect(decode(chunks(&data, size), ContentCoding::Gzip)).await.unwrap();
            assert_eq!(out, TEXT.as_bytes(), "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn gzip_tolerates_trailing_garbage_and_truncation() {
        let mut data = gzip();
        data.extend_from_slice(b"\r\n");
        let out = collect(decode(chunks(&data, 16), ContentCoding::Gzip)).await.unwrap();
        assert_eq!(out, TEXT.as_bytes());

        let data = gzip();
        let truncated = &data[..data.len() - 4];
        let out = collect(decode(chunks(truncated, 16), ContentCoding::Gzip)).await.unwrap();
        assert_eq!(out, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn deflate_sniffs_framing() {
        let zlib = zlib();
        assert!(is_zlib_header(zlib[0]));
        let out = collect(decode(chunks(&zlib, 5), ContentCoding::Deflate)).await.unwrap();
        assert_eq!(out, TEXT.as_bytes());

        let raw = raw_deflate();
        let out = collect(decode(chunks(&raw, 5), ContentCoding::Deflate)).await.unwrap();
        assert_eq!(out, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn truncated_deflate_fails() {
        let data = zlib();
        let truncated = &data[..data.len() / 2];
        let err = collect(decode(chunks(truncated, 4), ContentCoding::Deflate)).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn empty_deflate_body_is_empty() {
        let out = collect(decode(chunks(&[], 1), ContentCoding::Deflate)).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn corrupt_input_is_a_stream_error() {
        let bad = b"\x1f\x8b\x08\x00\x00\x00\x00\x00\x00\x03\xff\xff\xff\xff";
        let err = collect(decode(chunks(bad, 4), ContentCoding::Gzip))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn source_errors_pass_through() {
        let items: Vec<Result<Bytes>> = vec![Ok(Bytes::from(gzip()[..4].to_vec())), Err(FetchError::PrematureClose)];
        let err = collect(decode(Box::pin(stream::iter(items)), ContentCoding::Gzip)).await.unwrap_err();
        assert_eq!(err, FetchError::PrematureClose);
    }

    #[tokio::test]
    async fn identity_is_untouched() {
        let out = collect(decode(chunks(b"plain", 2), ContentCoding::Identity)).await.unwrap();
        assert_eq!(out, b"plain");
    }

    #[cfg(feature = "brotli")]
    #[tokio::test]
    async fn brotli_round_trip_in_small_chunks() {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(TEXT.as_bytes()).unwrap();
        }
        let out = collect(decode(chunks(&compressed, 3), ContentCoding::Brotli)).await.unwrap();
        assert_eq!(out, TEXT.as_bytes());
    }
}
