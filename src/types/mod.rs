//! Core types for decoded CPTV data.
//!
//! ## Architecture
//!
//! - [`Header`] is read once per recording and never changes afterwards
//! - [`Frame`] carries one decoded sample buffer plus its [`FrameHeader`]
//! - [`Metadata`] combines the header with the frame count and duration
//!
//! ## Usage Example
//!
//! ```rust
//! use cptv_player::types::{Frame, FrameHeader, ImageStats};
//!
//! let header = FrameHeader {
//!     time_on_ms: 1000,
//!     last_ffc_time_ms: None,
//!     last_ffc_temp_c: None,
//!     frame_temp_c: None,
//!     is_background_frame: false,
//!     bit_width: 8,
//!     image: ImageStats { width: 2, height: 2, min: 2900, max: 3100 },
//! };
//!
//! let frame = Frame::new(vec![2900, 3000, 3050, 3100], header);
//! assert_eq!(frame.sample_range(), Some((2900, 3100)));
//! ```

mod frame;
mod header;
mod metadata;

pub use frame::{Frame, FrameHeader, ImageStats};
pub use header::{Header, Location};
pub use metadata::{Metadata, duration_secs};
