//! Byte source over a live byte stream

use std::io;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::source::{ByteSource, Chunk};
use crate::Result;

/// Wraps a network body (or any byte stream) as a [`ByteSource`].
///
/// Chunk boundaries are whatever the stream yields. The stream is dropped on
/// cancellation or exhaustion, which releases the underlying connection.
pub struct StreamedSource {
    stream: Option<BoxStream<'static, io::Result<Bytes>>>,
    expected_len: Option<u64>,
    received: u64,
    cancel: CancellationToken,
}

impl StreamedSource {
    /// Wrap a byte stream of known or unknown total length.
    pub fn new<S>(stream: S, expected_len: Option<u64>) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: Some(stream.boxed()),
            expected_len,
            received: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Wrap the receiving half of a channel fed by a download task.
    pub fn from_receiver(rx: mpsc::Receiver<Bytes>, expected_len: Option<u64>) -> Self {
        Self::new(ReceiverStream::new(rx).map(Ok::<_, io::Error>), expected_len)
    }

    /// Bytes delivered so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    fn finish(&mut self) {
        self.stream = None;
    }
}

#[async_trait::async_trait]
impl ByteSource for StreamedSource {
    async fn read(&mut self) -> Result<Chunk> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Chunk::done());
        };

        let next = tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Streamed source cancelled during read");
                None
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(data)) => {
                self.received += data.len() as u64;
                trace!("Streamed chunk: {} bytes ({} total)", data.len(), self.received);
                Ok(Chunk::data(data))
            }
            Some(Err(e)) => {
                warn!("Streamed source failed after {} bytes: {}", self.received, e);
                self.finish();
                Err(e.into())
            }
            None => {
                if let Some(expected) = self.expected_len.filter(|&e| e != self.received) {
                    warn!("Stream ended at {} bytes, expected {}", self.received, expected);
                }
                self.finish();
                Ok(Chunk::done())
            }
        }
    }

    async fn cancel(&mut self) {
        self.cancel.cancel();
        self.finish();
    }

    fn expected_len(&self) -> Option<u64> {
        self.expected_len
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CptvError;
    use futures::stream;

    #[tokio::test]
    async fn yields_stream_chunks_then_done() {
        let parts = vec![Ok(Bytes::from_static(b"CPTV")), Ok(Bytes::from_static(b"\x02"))];
        let mut source = StreamedSource::new(stream::iter(parts), Some(5));

        assert_eq!(source.read().await.unwrap().data, Bytes::from_static(b"CPTV"));
        assert_eq!(source.read().await.unwrap().data, Bytes::from_static(b"\x02"));
        assert_eq!(source.read().await.unwrap(), Chunk::done());
        assert_eq!(source.received(), 5);
    }

    #[tokio::test]
    async fn transport_errors_surface_as_source_errors() {
        let parts = vec![Ok(Bytes::from_static(b"CP")), Err(io::Error::other("reset"))];
        let mut source = StreamedSource::new(stream::iter(parts), None);

        assert!(!source.read().await.unwrap().done);
        let err = source.read().await.expect_err("second read should fail");
        assert!(matches!(err, CptvError::Source { .. }));
        assert!(source.read().await.unwrap().done);
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_stalled_read() {
        let (_tx, rx) = mpsc::channel::<Bytes>(1);
        let mut source = StreamedSource::from_receiver(rx, None);
        let token = source.cancellation();

        let reader = tokio::spawn(async move { source.read().await });
        tokio::task::yield_now().await;
        token.cancel();

        let chunk = reader.await.expect("reader task panicked").unwrap();
        assert!(chunk.done);
    }

    #[tokio::test]
    async fn cancel_twice_is_harmless() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(Bytes::from_static(b"abc")).await.unwrap();
        let mut source = StreamedSource::from_receiver(rx, Some(3));

        source.cancel().await;
        source.cancel().await;
        assert!(source.read().await.unwrap().done);
    }
}
