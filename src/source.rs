//! Byte source trait for decode input

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// One pull from a [`ByteSource`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    /// Bytes delivered by this read; empty once `done` is set
    pub data: Bytes,
    /// No further data will follow
    pub done: bool,
}

impl Chunk {
    /// A chunk carrying data.
    pub fn data(data: Bytes) -> Self {
        Self { data, done: false }
    }

    /// The terminal, empty chunk.
    pub fn done() -> Self {
        Self { data: Bytes::new(), done: true }
    }
}

/// Uniform pull-based reader over recording bytes.
///
/// Sources abstract over where the bytes live (a resident buffer or a network
/// stream). The decode engine pulls from them; the decode session only keeps
/// the [`CancellationToken`] so it can cut a source loose after handing it to
/// the engine.
#[async_trait::async_trait]
pub trait ByteSource: Send + 'static {
    /// Pull the next chunk.
    ///
    /// Returns:
    /// - `Ok(Chunk { done: false, .. })` - more data
    /// - `Ok(Chunk { done: true, .. })` - exhausted or cancelled, data is empty
    /// - `Err(e)` - the underlying transport failed
    async fn read(&mut self) -> Result<Chunk>;

    /// Release the underlying resource and drop buffered data.
    ///
    /// Idempotent; later reads report `done`.
    async fn cancel(&mut self);

    /// Total length in bytes, when known up front.
    fn expected_len(&self) -> Option<u64>;

    /// Token that cancels this source when triggered from elsewhere.
    fn cancellation(&self) -> CancellationToken;
}
