//! Mapping playback time to frame indices

use crate::types::Metadata;

/// Frame index to show `time` seconds into a recording `duration` seconds long.
///
/// `time` is clamped to `[0, duration]`. When `total_frames` is unknown it is
/// taken as `floor(duration * fps)`. A leading background frame occupies no
/// playback time, so it shifts every index down by one, saturating at zero.
///
/// ```rust
/// use cptv_player::render::frame_index_at_time;
///
/// assert_eq!(frame_index_at_time(2.5, 5.0, 9.0, Some(45), false), 22);
/// assert_eq!(frame_index_at_time(2.5, 5.0, 9.0, Some(46), true), 22);
/// assert_eq!(frame_index_at_time(-1.0, 5.0, 9.0, None, false), 0);
/// ```
pub fn frame_index_at_time(
    time: f64,
    duration: f64,
    fps: f64,
    total_frames: Option<u32>,
    has_background_frame: bool,
) -> usize {
    if !(duration > 0.0) || time.is_nan() {
        return 0;
    }
    let time = time.clamp(0.0, duration);
    let total = match total_frames {
        Some(total) => f64::from(total),
        None => (duration * fps).floor().max(0.0),
    };

    let index = (time / duration * total).min(total).floor() as usize;
    if has_background_frame { index.saturating_sub(1) } else { index }
}

impl Metadata {
    /// [`frame_index_at_time`] using this recording's duration and frame rate.
    pub fn frame_index_at_time(&self, time: f64) -> usize {
        frame_index_at_time(
            time,
            self.duration,
            f64::from(self.header.fps),
            Some(self.total_frames),
            self.header.has_background_frame,
        )
    }
}
