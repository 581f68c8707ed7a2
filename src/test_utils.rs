//! Test utilities: a scripted decode engine and synthetic recordings
//!
//! [`FakeEngine`] stands in for a real bitstream parser. It pulls bytes from
//! its source the way a real engine would (so load progress moves) but the
//! header and frames it reports come from a [`FakeScript`]. Call counters and
//! stall gates let tests observe exactly what a session asked of it.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::Notify;

use crate::engine::DecodeEngine;
use crate::source::ByteSource;
use crate::types::{FrameHeader, Header, ImageStats};
use crate::{CptvError, Result};

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder for synthetic recording headers.
#[derive(Debug, Clone)]
pub struct HeaderBuilder {
    header: Header,
}

/// Start a header for a 160x120 recording at 9 fps.
pub fn header_builder() -> HeaderBuilder {
    HeaderBuilder {
        header: Header {
            timestamp: 1_600_000_000_000_000,
            width: 160,
            height: 120,
            fps: 9,
            compression: 1,
            device_name: Some("fake-device".to_string()),
            device_id: Some(42),
            brand: Some("flir".to_string()),
            model: Some("lepton3.5".to_string()),
            serial_number: Some(1234),
            firmware_version: None,
            motion_config: None,
            preview_secs: None,
            location: None,
            has_background_frame: false,
            min_value: None,
            max_value: None,
            total_frames: None,
        },
    }
}

impl HeaderBuilder {
    pub fn width(mut self, width: u32) -> Self {
        self.header.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.header.height = height;
        self
    }

    pub fn fps(mut self, fps: u8) -> Self {
        self.header.fps = fps;
        self
    }

    pub fn total_frames(mut self, total: u32) -> Self {
        self.header.total_frames = Some(total);
        self
    }

    pub fn background_frame(mut self, has_background_frame: bool) -> Self {
        self.header.has_background_frame = has_background_frame;
        self
    }

    pub fn build(self) -> Header {
        self.header
    }
}

/// Frame header with the given time and image size.
pub fn frame_header(time_on_ms: u32, width: u32, height: u32) -> FrameHeader {
    FrameHeader {
        time_on_ms,
        last_ffc_time_ms: Some(0),
        last_ffc_temp_c: Some(30.5),
        frame_temp_c: Some(31.0),
        is_background_frame: false,
        bit_width: 8,
        image: ImageStats { width, height, min: 2900, max: 3100 },
    }
}

/// One scripted frame.
#[derive(Debug, Clone)]
pub struct FakeFrame {
    pub header: FrameHeader,
    pub samples: Vec<u16>,
}

/// `count` frames of a gradient pattern, one frame period (at 9 fps) apart.
pub fn synthetic_frames(count: usize, width: u32, height: u32) -> Vec<FakeFrame> {
    let len = width as usize * height as usize;
    (0..count)
        .map(|i| FakeFrame {
            header: frame_header(1000 + i as u32 * 111, width, height),
            samples: (0..len).map(|p| 2900 + ((p + i) % 200) as u16).collect(),
        })
        .collect()
}

/// Counters shared between a script and every engine created from it.
#[derive(Debug, Default)]
pub struct FakeProbe {
    pub created: AtomicUsize,
    pub header_calls: AtomicUsize,
    pub frame_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
    next_handle: AtomicU64,
    live_handle: AtomicU64,
}

impl FakeProbe {
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn frame_calls(&self) -> usize {
        self.frame_calls.load(Ordering::SeqCst)
    }

    fn issue_handle(&self) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.live_handle.store(handle, Ordering::SeqCst);
        handle
    }
}

/// Pauses the fake engine inside `fetch_next_frame` until released.
#[derive(Debug, Clone, Default)]
pub struct StallGate {
    /// Notified when the engine reaches the gate
    pub entered: Arc<Notify>,
    /// Notify to let the engine continue
    pub release: Arc<Notify>,
}

/// What a [`FakeEngine`] reports. Doubles as the engine context.
#[derive(Debug, Clone)]
pub struct FakeScript {
    pub header: Option<Header>,
    pub frames: Arc<Vec<FakeFrame>>,
    pub fail_init: Option<String>,
    pub fail_frame_at: Option<usize>,
    pub fail_count: bool,
    pub gate: Option<StallGate>,
    pub probe: Arc<FakeProbe>,
}

impl FakeScript {
    pub fn new(header: Header, frames: Vec<FakeFrame>) -> Self {
        Self {
            header: Some(header),
            frames: Arc::new(frames),
            fail_init: None,
            fail_frame_at: None,
            fail_count: false,
            gate: None,
            probe: Arc::new(FakeProbe::default()),
        }
    }

    /// A 160x120, 9 fps recording with `count` frames.
    pub fn with_frames(count: usize) -> Self {
        Self::new(header_builder().build(), synthetic_frames(count, 160, 120))
    }

    /// Header bytes that do not parse.
    pub fn without_header(mut self) -> Self {
        self.header = None;
        self
    }

    pub fn failing_init(mut self, reason: &str) -> Self {
        self.fail_init = Some(reason.to_string());
        self
    }

    /// Fail the `n`th (zero-based) frame fetch.
    pub fn failing_frame_at(mut self, n: usize) -> Self {
        self.fail_frame_at = Some(n);
        self
    }

    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    pub fn with_gate(mut self, gate: StallGate) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Scripted [`DecodeEngine`].
pub struct FakeEngine {
    script: FakeScript,
    source: Box<dyn ByteSource>,
    handle: u64,
    bytes_loaded: u64,
    source_done: bool,
    header_ready: bool,
    cursor: usize,
    current: Option<FakeFrame>,
    complete: bool,
}

impl FakeEngine {
    /// Panics if this handle is not the most recently issued one, then
    /// retires it in favour of a fresh handle.
    fn rotate_handle(&mut self) {
        let live = self.script.probe.live_handle.load(Ordering::SeqCst);
        assert_eq!(self.handle, live, "stale engine handle {} used (live is {})", self.handle, live);
        self.handle = self.script.probe.issue_handle();
    }

    async fn pump(&mut self) -> Result<()> {
        if self.source_done {
            return Ok(());
        }
        let chunk = self.source.read().await?;
        self.bytes_loaded += chunk.data.len() as u64;
        self.source_done = chunk.done;
        Ok(())
    }

    async fn drain(&mut self) -> Result<()> {
        while !self.source_done {
            self.pump().await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DecodeEngine for FakeEngine {
    type Context = FakeScript;

    async fn create_from_source(
        context: &FakeScript,
        source: Box<dyn ByteSource>,
    ) -> Result<Self> {
        context.probe.created.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &context.fail_init {
            return Err(CptvError::decode_init(reason.clone()));
        }

        let mut engine = FakeEngine {
            script: context.clone(),
            source,
            handle: context.probe.issue_handle(),
            bytes_loaded: 0,
            source_done: false,
            header_ready: false,
            cursor: 0,
            current: None,
            complete: false,
        };

        engine.pump().await?;
        if engine.bytes_loaded == 0 {
            return Err(CptvError::decode_init("source is empty"));
        }
        Ok(engine)
    }

    async fn fetch_header(mut self) -> Result<Self> {
        self.rotate_handle();
        self.script.probe.header_calls.fetch_add(1, Ordering::SeqCst);
        self.pump().await?;
        self.header_ready = true;
        Ok(self)
    }

    async fn fetch_next_frame(mut self) -> Result<Self> {
        self.rotate_handle();
        let call = self.script.probe.frame_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = self.script.gate.clone() {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.script.fail_frame_at == Some(call) {
            return Err(CptvError::frame_decode("frame checksum mismatch"));
        }

        self.pump().await?;
        self.header_ready = true;
        self.current = self.script.frames.get(self.cursor).cloned();
        if self.current.is_some() {
            self.cursor += 1;
        } else {
            self.drain().await?;
            self.complete = true;
        }
        Ok(self)
    }

    async fn count_total_frames(mut self) -> Result<Self> {
        self.rotate_handle();
        self.script.probe.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_count {
            return Err(CptvError::frame_decode("truncated frame record"));
        }

        self.drain().await?;
        self.header_ready = true;
        self.current = None;
        self.complete = true;
        Ok(self)
    }

    fn header(&self) -> Result<Header> {
        match (&self.script.header, self.header_ready) {
            (Some(header), true) => Ok(header.clone()),
            _ => Err(CptvError::HeaderParse),
        }
    }

    fn frame_header(&self) -> Option<FrameHeader> {
        self.current.as_ref().map(|f| f.header.clone())
    }

    fn frame_samples(&self) -> &[u16] {
        match &self.current {
            Some(frame) => &frame.samples,
            None => &[],
        }
    }

    fn total_frames(&self) -> Option<u32> {
        self.complete.then_some(self.script.frames.len() as u32)
    }

    fn bytes_loaded(&self) -> u64 {
        self.bytes_loaded
    }

    fn stream_complete(&self) -> bool {
        self.complete
    }
}
