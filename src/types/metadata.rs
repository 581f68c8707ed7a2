//! Recording metadata derived from the header and frame count

use serde::{Deserialize, Serialize};

use super::Header;

/// Header plus the values derived from it once the frame count is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Metadata {
    #[serde(flatten)]
    pub header: Header,
    /// Frames in the recording, background frame included
    pub total_frames: u32,
    /// Playback length in seconds
    pub duration: f64,
}

impl Metadata {
    /// Derive metadata from a header and a frame count.
    pub fn new(header: Header, total_frames: u32) -> Self {
        let duration = duration_secs(total_frames, header.fps);
        Self { header, total_frames, duration }
    }
}

/// `frames / fps`, or zero when the frame rate is unknown.
pub fn duration_secs(total_frames: u32, fps: u8) -> f64 {
    if fps == 0 {
        return 0.0;
    }
    total_frames as f64 / fps as f64
}
