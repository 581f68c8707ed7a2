//! Decode engine contract
//!
//! The engine is the bitstream parser. It is an external collaborator: this
//! crate never looks inside a CPTV record, it only drives an engine through the
//! narrow contract below.
//!
//! Every mutating call takes the engine by value and hands back a (possibly
//! identical) engine on success. A handle that has been passed to a mutating
//! call can no longer be named, so "engine in use elsewhere" is a compile-time
//! error rather than a runtime convention. On failure the handle is gone; the
//! session treats that as terminal.

use crate::source::ByteSource;
use crate::types::{FrameHeader, Header};
use crate::Result;

/// Bitstream parser driven by a [`DecodeSession`](crate::session::DecodeSession).
#[async_trait::async_trait]
pub trait DecodeEngine: Send + Sized + 'static {
    /// Resource loaded once per worker and shared by every engine it creates
    /// (for example a compiled decoder module).
    type Context: Send + Sync + 'static;

    /// Start parsing against `source`.
    ///
    /// Fails with [`CptvError::DecodeInit`](crate::CptvError::DecodeInit) when
    /// the source is empty or does not start with a CPTV signature.
    async fn create_from_source(
        context: &Self::Context,
        source: Box<dyn ByteSource>,
    ) -> Result<Self>;

    /// Advance until the header is parseable. Read it with [`header`](Self::header).
    async fn fetch_header(self) -> Result<Self>;

    /// Decode the next frame.
    ///
    /// At the end of the stream the frame buffer is empty and
    /// [`stream_complete`](Self::stream_complete) turns true.
    async fn fetch_next_frame(self) -> Result<Self>;

    /// Consume the rest of the stream to count frames, keeping no frame data.
    ///
    /// No frame reads are valid on the returned engine.
    async fn count_total_frames(self) -> Result<Self>;

    /// The recording header.
    ///
    /// Available once the header has been parsed, which every frame fetch
    /// and frame count does before anything else. Fails with [`CptvError::HeaderParse`](crate::CptvError::HeaderParse)
    /// when the leading bytes are not a valid header.
    fn header(&self) -> Result<Header>;

    /// Header of the most recently decoded frame.
    fn frame_header(&self) -> Option<FrameHeader>;

    /// Samples of the most recently decoded frame; empty at end of stream.
    fn frame_samples(&self) -> &[u16];

    /// Frame count, only meaningful once [`stream_complete`](Self::stream_complete).
    fn total_frames(&self) -> Option<u32>;

    /// Bytes pulled from the source so far.
    fn bytes_loaded(&self) -> u64;

    /// Whether the source has been read to the end.
    fn stream_complete(&self) -> bool;
}

/// Holder for the one live engine of a session.
#[derive(Debug)]
pub enum EngineSlot<E> {
    Empty,
    Owns(E),
}

impl<E> Default for EngineSlot<E> {
    fn default() -> Self {
        EngineSlot::Empty
    }
}

impl<E> EngineSlot<E> {
    /// Move the engine out, leaving the slot empty.
    pub fn take(&mut self) -> Option<E> {
        match std::mem::replace(self, EngineSlot::Empty) {
            EngineSlot::Owns(engine) => Some(engine),
            EngineSlot::Empty => None,
        }
    }

    /// Place an engine in the slot, dropping any previous occupant.
    pub fn put(&mut self, engine: E) {
        *self = EngineSlot::Owns(engine);
    }

    pub fn get(&self) -> Option<&E> {
        match self {
            EngineSlot::Owns(engine) => Some(engine),
            EngineSlot::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EngineSlot::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_leaves_slot_empty() {
        let mut slot = EngineSlot::Owns(7u32);
        assert_eq!(slot.get(), Some(&7));

        assert_eq!(slot.take(), Some(7));
        assert!(slot.is_empty());
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn put_replaces_occupant() {
        let mut slot = EngineSlot::<u32>::default();
        slot.put(1u32);
        slot.put(2u32);
        assert_eq!(slot.take(), Some(2));
    }
}
