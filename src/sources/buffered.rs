//! Byte source over a resident buffer

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::source::{ByteSource, Chunk};
use crate::Result;

/// Number of chunks a buffer is split into when no maximum chunk size is set.
pub const DEFAULT_CHUNK_COUNT: usize = 5;

/// Serves an in-memory recording in a fixed, precomputed sequence of chunks.
///
/// Splitting a resident buffer lets the engine exercise the same incremental
/// path it uses for network streams, and makes load progress observable.
pub struct BufferedSource {
    data: Bytes,

    /// Chunk boundaries, `chunk_count + 1` entries from 0 to `data.len()`
    offsets: Vec<usize>,

    /// Index of the next chunk to serve
    next: usize,

    expected_len: u64,
    cancel: CancellationToken,
}

impl BufferedSource {
    /// Split `data` into chunks of at most `max_chunk_size` bytes.
    ///
    /// `None` or `Some(0)` falls back to [`DEFAULT_CHUNK_COUNT`] chunks.
    pub fn new(data: impl Into<Bytes>, max_chunk_size: Option<usize>) -> Self {
        let data = data.into();
        let count = match max_chunk_size {
            Some(max) if max > 0 => data.len().div_ceil(max).max(1),
            _ => DEFAULT_CHUNK_COUNT,
        };
        Self::with_chunk_count(data, count)
    }

    /// Split `data` into `count` roughly equal chunks.
    pub fn with_chunk_count(data: impl Into<Bytes>, count: usize) -> Self {
        let data = data.into();
        let offsets = chunk_offsets(data.len(), count.max(1));
        debug!("Buffered source: {} bytes in {} chunks", data.len(), offsets.len() - 1);

        Self {
            expected_len: data.len() as u64,
            data,
            offsets,
            next: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Number of data chunks this source serves before reporting `done`.
    pub fn chunk_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

/// Boundaries for `count` chunks over `len` bytes; chunk `i` spans
/// `offsets[i]..offsets[i + 1]`.
fn chunk_offsets(len: usize, count: usize) -> Vec<usize> {
    (0..=count).map(|i| i * len / count).collect()
}

#[async_trait::async_trait]
impl ByteSource for BufferedSource {
    async fn read(&mut self) -> Result<Chunk> {
        if self.cancel.is_cancelled() || self.next + 1 >= self.offsets.len() {
            return Ok(Chunk::done());
        }

        let (start, end) = (self.offsets[self.next], self.offsets[self.next + 1]);
        self.next += 1;
        trace!("Buffered chunk {}: bytes {}..{}", self.next, start, end);

        Ok(Chunk::data(self.data.slice(start..end)))
    }

    async fn cancel(&mut self) {
        self.cancel.cancel();
        self.data = Bytes::new();
        self.offsets.clear();
        self.next = 0;
    }

    fn expected_len(&self) -> Option<u64> {
        Some(self.expected_len)
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
