//! Decode session: the single owner of a decode engine
//!
//! A session holds at most one engine and serialises every operation on it
//! through an async mutex. Waiters queue in FIFO order, so any number of
//! callers may contend for the session without corrupting engine state.
//!
//! Engine failures never escape as errors from frame-level calls. They move
//! the session into [`SessionState::Errored`] and are available afterwards
//! through [`DecodeSession::stream_error`].

use std::fmt;
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::engine::{DecodeEngine, EngineSlot};
use crate::source::ByteSource;
use crate::types::{Frame, FrameHeader, Header, Metadata};
use crate::{CptvError, Result};

/// Image width of the narrow sensor, whose frames carry a fixed time value.
const NARROW_SENSOR_WIDTH: u32 = 32;

/// Lifecycle of a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No engine
    Empty,
    /// Engine creation in progress
    Initializing,
    /// Engine created, no frames read yet
    Ready,
    /// At least one frame fetch has completed
    Reading,
    /// The stream has been read to the end, or consumed by a frame count
    Exhausted,
    /// The engine failed; only introspection remains valid
    Errored,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Empty => "empty",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Reading => "reading",
            SessionState::Exhausted => "exhausted",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

struct SessionInner<E> {
    slot: EngineSlot<E>,
    state: SessionState,
    frames_read: u32,
    error: Option<CptvError>,
    /// Set once `count_total_frames` has run; frame reads are invalid after
    consumed: bool,
    expected_len: Option<u64>,
    header: Option<Header>,
    prev_frame_header: Option<FrameHeader>,
    /// Frame count from the header or a completed count
    total_frames: Option<u32>,
}

impl<E> Default for SessionInner<E> {
    fn default() -> Self {
        Self {
            slot: EngineSlot::Empty,
            state: SessionState::Empty,
            frames_read: 0,
            error: None,
            consumed: false,
            expected_len: None,
            header: None,
            prev_frame_header: None,
            total_frames: None,
        }
    }
}

impl<E: DecodeEngine> SessionInner<E> {
    fn free(&mut self) {
        if self.slot.take().is_some() {
            debug!("Released decode engine after {} frames", self.frames_read);
        }
        *self = Self::default();
    }

    /// Record a terminal error and hand back a copy for the caller.
    fn fail(&mut self, err: CptvError) -> CptvError {
        error!("Decode session failed in state {}: {}", self.state, err);
        self.state = SessionState::Errored;
        self.error = Some(err.clone());
        err
    }

    fn readable(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::Reading)
    }

    fn state_error(&self, operation: &'static str) -> CptvError {
        self.error.clone().unwrap_or_else(|| CptvError::invalid_state(operation, self.state))
    }

    async fn fetch_header(&mut self) -> Result<Header> {
        if let Some(header) = &self.header {
            return Ok(header.clone());
        }
        if self.state == SessionState::Exhausted {
            // Reading or counting parsed the header on the way through
            let engine = self.slot.get().ok_or_else(|| self.state_error("fetch header"))?;
            let header = engine.header()?;
            return Ok(self.cache_header(header));
        }
        if !self.readable() {
            return Err(self.state_error("fetch header"));
        }
        let Some(engine) = self.slot.take() else {
            return Err(self.state_error("fetch header"));
        };

        let engine = match engine.fetch_header().await {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e)),
        };
        let header = engine.header();
        self.slot.put(engine);

        match header {
            Ok(header) => Ok(self.cache_header(header)),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn cache_header(&mut self, header: Header) -> Header {
        debug!(
            "Header: {}x{} @ {}fps, total frames {:?}",
            header.width, header.height, header.fps, header.total_frames
        );
        self.total_frames = self.total_frames.or(header.total_frames);
        self.header = Some(header.clone());
        header
    }

    async fn fetch_next_frame(&mut self) -> Option<Frame> {
        if self.consumed || !self.readable() {
            debug!("Frame requested in state {} (consumed: {})", self.state, self.consumed);
            return None;
        }
        let engine = self.slot.take()?;

        let engine = match engine.fetch_next_frame().await {
            Ok(engine) => engine,
            Err(e) => {
                self.fail(as_frame_error(e));
                return None;
            }
        };

        let samples = engine.frame_samples();
        let decoded = if samples.is_empty() {
            None
        } else {
            Some((samples.to_vec(), engine.frame_header()))
        };
        let complete = engine.stream_complete();
        self.slot.put(engine);
        self.state = SessionState::Reading;

        let Some((samples, frame_header)) = decoded else {
            if complete {
                info!("Stream exhausted after {} frames", self.frames_read);
                self.state = SessionState::Exhausted;
            }
            return None;
        };
        let Some(frame_header) = frame_header else {
            self.fail(CptvError::frame_decode("frame decoded without a frame header"));
            return None;
        };

        if self.is_repeat(&frame_header) {
            debug!("Skipping repeated frame at {}ms", frame_header.time_on_ms);
            return None;
        }

        self.frames_read += 1;
        trace!("Frame {} at {}ms", self.frames_read, frame_header.time_on_ms);
        self.prev_frame_header = Some(frame_header.clone());
        Some(Frame::new(samples, frame_header))
    }

    /// Some engines hand back the previous frame again before the frame count
    /// is known. The narrow sensor stamps every frame with the same time, so
    /// its frames are never treated as repeats.
    fn is_repeat(&self, frame_header: &FrameHeader) -> bool {
        let Some(prev) = &self.prev_frame_header else {
            return false;
        };
        prev.time_on_ms == frame_header.time_on_ms
            && frame_header.image.width != NARROW_SENSOR_WIDTH
            && self.total_frames.is_none()
    }

    async fn count_total_frames(&mut self) -> u32 {
        if self.consumed {
            return self.total_frames.unwrap_or(self.frames_read);
        }
        if !self.readable() {
            debug!("Frame count requested in state {}", self.state);
            let finished = self.slot.get().filter(|engine| engine.stream_complete());
            return finished.and_then(|engine| engine.total_frames()).unwrap_or(self.frames_read);
        }
        let Some(engine) = self.slot.take() else {
            return self.frames_read;
        };

        match engine.count_total_frames().await {
            Ok(engine) => {
                let total = if engine.stream_complete() { engine.total_frames() } else { None };
                self.slot.put(engine);
                self.consumed = true;
                self.state = SessionState::Exhausted;

                match total {
                    Some(total) => {
                        info!("Counted {} frames", total);
                        self.total_frames = Some(total);
                        total
                    }
                    None => {
                        warn!("Engine finished counting without a total");
                        self.frames_read
                    }
                }
            }
            Err(e) => {
                self.fail(as_frame_error(e));
                self.frames_read
            }
        }
    }
}

fn as_frame_error(err: CptvError) -> CptvError {
    match err {
        CptvError::FrameDecode { .. } => err,
        other => CptvError::frame_decode(other.to_string()),
    }
}

/// Owner of one decode engine at a time.
pub struct DecodeSession<E: DecodeEngine> {
    context: Arc<E::Context>,
    inner: Mutex<SessionInner<E>>,
    /// Kept outside the async lock so `free` can cut off a stalled read
    source_cancel: std::sync::Mutex<Option<CancellationToken>>,
}

impl<E: DecodeEngine> DecodeSession<E> {
    /// Create an empty session backed by a shared engine context.
    pub fn new(context: Arc<E::Context>) -> Self {
        Self {
            context,
            inner: Mutex::new(SessionInner::default()),
            source_cancel: std::sync::Mutex::new(None),
        }
    }

    /// Cancel the current source without waiting for the session.
    pub fn cancel_source(&self) {
        let token = self.source_cancel.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    fn track_source(&self, token: CancellationToken) {
        *self.source_cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Free any current engine and start decoding `source`.
    ///
    /// On failure the session is left [`SessionState::Errored`] and still
    /// answers [`has_stream_error`](Self::has_stream_error).
    pub async fn init(&self, source: Box<dyn ByteSource>) -> Result<()> {
        self.cancel_source();
        let mut inner = self.inner.lock().await;
        inner.free();

        inner.state = SessionState::Initializing;
        inner.expected_len = source.expected_len();
        self.track_source(source.cancellation());
        debug!("Initialising decode session (expected {:?} bytes)", inner.expected_len);

        match E::create_from_source(&self.context, source).await {
            Ok(engine) => {
                inner.slot.put(engine);
                inner.state = SessionState::Ready;
                info!("Decode session ready");
                Ok(())
            }
            Err(e) => Err(inner.fail(e)),
        }
    }

    /// Read the recording header, caching it for later calls.
    pub async fn fetch_header(&self) -> Result<Header> {
        self.inner.lock().await.fetch_header().await
    }

    /// Decode the next distinct frame.
    ///
    /// Returns `None` at the end of the stream, for a repeated frame, after an
    /// engine failure, or when the session cannot read frames. A `None` for a
    /// repeat is not the end: callers keep reading and do not advance their
    /// own frame counter.
    pub async fn fetch_next_frame(&self) -> Option<Frame> {
        self.inner.lock().await.fetch_next_frame().await
    }

    /// Scan the rest of the stream to count frames.
    ///
    /// Frame reads are invalid afterwards. Falls back to the number of frames
    /// read so far if the engine fails.
    pub async fn count_total_frames(&self) -> u32 {
        self.inner.lock().await.count_total_frames().await
    }

    /// Frame count, if it can be known without waiting.
    ///
    /// `None` while another operation holds the session, before
    /// initialisation, or until the engine has read the whole stream. `None`
    /// never means zero frames.
    pub fn get_total_frames(&self) -> Option<u32> {
        let inner = self.inner.try_lock().ok()?;
        let engine = inner.slot.get()?;
        if !engine.stream_complete() {
            return None;
        }
        engine.total_frames()
    }

    /// Fraction of the expected bytes the engine has pulled so far.
    ///
    /// `None` while another operation holds the session, before
    /// initialisation, or when the source length is unknown. May exceed 1.0
    /// if the source misreported its length.
    pub fn get_load_progress(&self) -> Option<f64> {
        let inner = self.inner.try_lock().ok()?;
        let engine = inner.slot.get()?;
        let expected = inner.expected_len.filter(|&len| len > 0)?;

        let progress = engine.bytes_loaded() as f64 / expected as f64;
        if progress > 1.0 {
            warn!("Loaded {} bytes of an expected {}", engine.bytes_loaded(), expected);
        }
        Some(progress)
    }

    /// Header plus frame count and duration.
    ///
    /// Uses the header's own frame count when present and only scans the
    /// stream otherwise. Scanning consumes the session.
    pub async fn get_metadata(&self) -> Result<Metadata> {
        let mut inner = self.inner.lock().await;
        if let Some(err) = &inner.error {
            return Err(err.clone());
        }

        let header = inner.fetch_header().await?;
        let total_frames = match header.total_frames {
            Some(total) => total,
            None => inner.count_total_frames().await,
        };
        if let Some(err) = &inner.error {
            return Err(err.clone());
        }

        Ok(Metadata::new(header, total_frames))
    }

    pub async fn has_stream_error(&self) -> bool {
        self.inner.lock().await.error.is_some()
    }

    /// The error that ended this session, if any.
    pub async fn stream_error(&self) -> Option<CptvError> {
        self.inner.lock().await.error.clone()
    }

    /// Cancel the source, drop the engine and reset all state.
    ///
    /// The source is cancelled before waiting for the session, so an
    /// operation stalled on a slow stream finishes promptly.
    pub async fn free(&self) {
        self.cancel_source();
        self.inner.lock().await.free();
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Distinct frames returned since initialisation.
    pub async fn frames_read(&self) -> u32 {
        self.inner.lock().await.frames_read
    }
}
