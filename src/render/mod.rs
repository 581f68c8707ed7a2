//! Frame rendering
//!
//! Pure functions: nothing here touches a decode session, so any holder of a
//! [`Frame`](crate::types::Frame) can render it on any thread.

mod colour_map;
mod playback;
mod renderer;

pub use colour_map::{COLOUR_MAP_LEN, ColourMap, ColourMapName};
pub use playback::frame_index_at_time;
pub use renderer::{colour_index, render_frame, render_into, try_render_frame};

use crate::types::Frame;

impl Frame {
    /// Render with the frame's own sample range.
    ///
    /// An empty frame renders to an empty buffer.
    pub fn to_rgba(&self, colour_map: &ColourMap) -> Vec<u8> {
        let (min, max) = self.sample_range().unwrap_or_default();
        render_frame(&self.samples, colour_map, f64::from(min), f64::from(max))
    }
}
