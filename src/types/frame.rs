//! Decoded frame types

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Per-frame metadata produced alongside every decoded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct FrameHeader {
    /// Milliseconds since the camera powered on
    pub time_on_ms: u32,
    /// Time of the last flat-field correction
    pub last_ffc_time_ms: Option<u32>,
    /// Sensor temperature at the last flat-field correction
    pub last_ffc_temp_c: Option<f32>,
    /// Sensor temperature for this frame
    pub frame_temp_c: Option<f32>,
    pub is_background_frame: bool,
    /// Bit width of the packed deltas this frame was stored with
    pub bit_width: u8,
    /// Stats the encoder embedded for this frame
    pub image: ImageStats,
}

/// Dimensions and sample range embedded in each frame record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub min: u16,
    pub max: u16,
}

/// A decoded thermal frame.
///
/// Samples are shared through an `Arc` so a frame can cross the worker
/// boundary and be handed to several renderers without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw sensor samples, row-major, `width * height` long
    pub samples: Arc<[u16]>,
    pub header: FrameHeader,
}

impl Frame {
    /// Create a new frame
    pub fn new(samples: Vec<u16>, header: FrameHeader) -> Self {
        Self { samples: samples.into(), header }
    }

    /// Frame width in pixels
    pub fn width(&self) -> u32 {
        self.header.image.width
    }

    /// Frame height in pixels
    pub fn height(&self) -> u32 {
        self.header.image.height
    }

    /// Actual smallest and largest sample in this frame.
    ///
    /// Returns `None` for an empty frame.
    pub fn sample_range(&self) -> Option<(u16, u16)> {
        let first = *self.samples.first()?;
        Some(self.samples.iter().fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::frame_header;

    #[test]
    fn sample_range_scans_every_sample() {
        let frame = Frame::new(vec![3000, 2950, 3100, 3050], frame_header(0, 2, 2));
        assert_eq!(frame.sample_range(), Some((2950, 3100)));
    }

    #[test]
    fn empty_frame_has_no_range() {
        let frame = Frame::new(Vec::new(), frame_header(0, 0, 0));
        assert_eq!(frame.sample_range(), None);
    }

    #[test]
    fn cloned_frames_share_samples() {
        let frame = Frame::new(vec![1, 2, 3, 4], frame_header(0, 2, 2));
        let copy = frame.clone();
        assert!(Arc::ptr_eq(&frame.samples, &copy.samples));
    }
}
