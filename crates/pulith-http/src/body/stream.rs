//! Small adapters that turn byte sources into chunk streams.

use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, stream};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::BoxStream;
use crate::error::{FetchError, Result};
use crate::signal::AbortSignal;

const READ_CHUNK: usize = 16 * 1024;

/// A stream yielding `bytes` once.
pub(crate) fn once(bytes: Bytes) -> BoxStream<'static, Result<Bytes>> {
    Box::pin(stream::iter(Some(Ok(bytes))))
}

/// Proxy a reader into chunks, issuing one read per poll.
///
/// Nothing is read until the consumer asks for the next chunk.
pub(crate) fn reader_stream<R>(reader: R) -> BoxStream<'static, Result<Bytes>>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::pin(stream::unfold(Some(reader), |reader| async move {
        let mut reader = reader?;
        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        match reader.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some(reader))),
            Err(e) => Some((Err(FetchError::from(e)), None)),
        }
    }))
}

/// End `inner` with [`FetchError::Aborted`] as soon as `signal` fires.
///
/// The inner stream is dropped at that point, which releases whatever
/// connection is feeding it.
pub(crate) fn abortable(
    inner: BoxStream<'static, Result<Bytes>>,
    signal: AbortSignal,
) -> BoxStream<'static, Result<Bytes>> {
    Box::pin(stream::unfold(Some((inner, signal)), |state| async move {
        let (mut inner, signal) = state?;
        tokio::select! {
            biased;
            _ = signal.aborted() => Some((Err(FetchError::Aborted), None)),
            next = inner.next() => next.map(|item| {
                let keep = item.is_ok();
                (item, keep.then_some((inner, signal)))
            }),
        }
    }))
}
