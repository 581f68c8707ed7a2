//! Recording header types

use serde::{Deserialize, Serialize};

/// Recording-level metadata read once from the start of a CPTV stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Header {
    /// Capture start, microseconds since the Unix epoch
    pub timestamp: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: u8,
    /// Compression scheme identifier
    pub compression: u8,
    pub device_name: Option<String>,
    pub device_id: Option<u32>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<u32>,
    pub firmware_version: Option<String>,
    pub motion_config: Option<String>,
    /// Seconds of pre-trigger footage
    pub preview_secs: Option<u8>,
    pub location: Option<Location>,
    /// Whether frame 0 is a background frame outside of playback time
    pub has_background_frame: bool,
    /// Smallest sample value across the recording, when the writer stored it
    pub min_value: Option<u16>,
    /// Largest sample value across the recording, when the writer stored it
    pub max_value: Option<u16>,
    /// Frame count, when the writer stored it
    pub total_frames: Option<u32>,
}

impl Header {
    /// Number of samples in one frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Recording-wide sample range, if both bounds were stored.
    pub fn sample_range(&self) -> Option<(u16, u16)> {
        self.min_value.zip(self.max_value)
    }
}

/// Where the recording device was when it captured the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct Location {
    pub latitude: f32,
    pub longitude: f32,
    /// Microseconds since the Unix epoch
    pub timestamp: Option<u64>,
    pub altitude: Option<f32>,
    pub accuracy: Option<f32>,
}
