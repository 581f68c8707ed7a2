//! Error types for CPTV decoding and rendering.
//!
//! Every fallible operation in the crate returns [`CptvError`]. The type is
//! `Clone` so that a decode session can keep its terminal error around and hand
//! copies to anyone who asks for it later.
//!
//! ## Error Categories
//!
//! - **Init Errors**: empty or malformed sources at session creation
//! - **Header Errors**: the leading bytes are not a valid CPTV header
//! - **Frame Errors**: the engine failed while decoding or counting frames
//! - **Render Errors**: a sample fell outside the requested `[min, max]` range
//! - **State Errors**: an operation was issued in a state that forbids it
//! - **Worker Errors**: the decode worker is gone or never became ready
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use cptv_player::CptvError;
//!
//! let error = CptvError::source_failed("connection reset");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Message carried by every header parse failure.
pub const HEADER_PARSE_FAILURE: &str = "Unable to parse header";

/// Result type alias for CPTV operations.
pub type Result<T, E = CptvError> = std::result::Result<T, E>;

/// Main error type for CPTV operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum CptvError {
    #[error("Failed to initialise decoder: {reason}")]
    DecodeInit { reason: String },

    #[error("Unable to parse header")]
    HeaderParse,

    #[error("Frame decode failed: {reason}")]
    FrameDecode { reason: String },

    #[error("Sample {sample} maps to colour index {index}, outside [{min}, {max}]")]
    RenderRange { index: i64, sample: u16, min: f64, max: f64 },

    #[error("Cannot {operation} while session is {state}")]
    InvalidState { operation: &'static str, state: String },

    #[error("Byte source error: {reason}")]
    Source {
        reason: String,
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    #[error("Decode worker unavailable: {reason}")]
    WorkerUnavailable { reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Invalid configuration: {details}")]
    Config { details: String },
}

impl CptvError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CptvError::Source { .. } => true,
            CptvError::Timeout { .. } => true,
            CptvError::WorkerUnavailable { .. } => true,
            CptvError::DecodeInit { .. } => false,
            CptvError::HeaderParse => false,
            CptvError::FrameDecode { .. } => false,
            CptvError::RenderRange { .. } => false,
            CptvError::InvalidState { .. } => false,
            CptvError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CptvError::DecodeInit { .. } => vec![
                "Check the recording is not empty",
                "Verify the file is a CPTV recording",
            ],
            CptvError::HeaderParse => vec![
                "Verify the recording was fully uploaded",
                "Check the CPTV version is supported by the engine",
            ],
            CptvError::FrameDecode { .. } => vec![
                "Re-initialise the session and retry",
                "Check the recording for truncation or corruption",
            ],
            CptvError::RenderRange { .. } => vec![
                "Pass min/max that bound every sample in the frame",
                "Use Frame::sample_range to derive bounds",
            ],
            CptvError::InvalidState { .. } => vec![
                "Call init before reading frames",
                "Re-initialise after counting total frames",
            ],
            CptvError::Source { .. } => vec![
                "Check network connectivity",
                "Retry the download",
                "Verify the source length matches the recording size",
            ],
            CptvError::WorkerUnavailable { .. } => vec![
                "Spawn a new player",
                "Check the engine context loads successfully",
            ],
            CptvError::Timeout { .. } => {
                vec!["Increase the ready timeout", "Check the engine context load time"]
            }
            CptvError::Config { .. } => {
                vec!["Check configuration values", "Fall back to DecoderConfig::default()"]
            }
        }
    }

    /// Helper constructor for init errors.
    pub fn decode_init(reason: impl Into<String>) -> Self {
        CptvError::DecodeInit { reason: reason.into() }
    }

    /// Helper constructor for frame decode errors.
    pub fn frame_decode(reason: impl Into<String>) -> Self {
        CptvError::FrameDecode { reason: reason.into() }
    }

    /// Helper constructor for byte source errors.
    pub fn source_failed(reason: impl Into<String>) -> Self {
        CptvError::Source { reason: reason.into(), source: None }
    }

    /// Helper constructor for operations issued in the wrong session state.
    pub fn invalid_state(operation: &'static str, state: impl ToString) -> Self {
        CptvError::InvalidState { operation, state: state.to_string() }
    }

    /// Helper constructor for worker errors.
    pub fn worker_unavailable(reason: impl Into<String>) -> Self {
        CptvError::WorkerUnavailable { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        CptvError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for CptvError {
    fn from(err: std::io::Error) -> Self {
        CptvError::Source { reason: err.to_string(), source: Some(Arc::new(err)) }
    }
}

impl From<serde_yaml_ng::Error> for CptvError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        CptvError::Config { details: err.to_string() }
    }
}
