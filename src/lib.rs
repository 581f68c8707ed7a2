//! Streaming decode and playback for CPTV thermal recordings.
//!
//! `cptv-player` drives a CPTV bitstream decoder from async Rust. The decoder
//! itself is pluggable through the [`DecodeEngine`] trait; this crate supplies
//! everything around it:
//!
//! - **Byte sources**: resident buffers split into chunks, or live network
//!   streams of known or unknown length
//! - **Decode sessions**: a state machine that owns exactly one engine,
//!   serialises every operation on it and turns engine failures into a
//!   queryable stream error
//! - **Worker isolation**: the session runs on its own task behind a typed
//!   request/response channel, so a slow decode step never blocks the caller
//! - **Rendering**: colour-mapped RGBA output and time to frame-index math
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cptv_player::{Cptv, DecodeEngine, render::{ColourMap, ColourMapName}};
//! use futures::StreamExt;
//!
//! async fn play<E: DecodeEngine>(context: E::Context, bytes: Vec<u8>) -> cptv_player::Result<()> {
//!     let player = Cptv::spawn::<E>(context).await?;
//!     player.init_with_bytes(bytes).await?;
//!
//!     let header = player.get_header().await?;
//!     println!("{}x{} @ {} fps", header.width, header.height, header.fps);
//!
//!     let colours = ColourMap::get(ColourMapName::Viridis);
//!     {
//!         let mut frames = std::pin::pin!(player.frames());
//!         while let Some(frame) = frames.next().await {
//!             let rgba = frame.to_rgba(colours);
//!             println!("frame at {} ms: {} bytes", frame.header.time_on_ms, rgba.len());
//!         }
//!     }
//!
//!     player.terminate().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decode pipeline
pub mod engine;
pub mod session;
pub mod source;
pub mod sources;
pub mod worker;

// Rendering
pub mod render;

// Core exports
pub use config::DecoderConfig;
pub use error::*;
pub use types::*;

// Pipeline exports
pub use engine::{DecodeEngine, EngineSlot};
pub use session::{DecodeSession, SessionState};
pub use source::{ByteSource, Chunk};
pub use sources::{BufferedSource, StreamedSource};
pub use worker::CptvPlayer;

use std::future::Future;

/// Unified entry point for spawning decode workers.
///
/// # Examples
///
/// ```rust,no_run
/// use cptv_player::{Cptv, DecodeEngine, DecoderConfig};
///
/// async fn open<E: DecodeEngine>(context: E::Context) -> cptv_player::Result<()> {
///     let config = DecoderConfig::default().with_max_chunk_size(64 * 1024);
///     let player = Cptv::spawn_with_config::<E>(context, config).await?;
///     player.init_with_bytes(std::fs::read("recording.cptv")?).await?;
///     let metadata = player.get_metadata().await?;
///     println!("{} frames, {:.1}s", metadata.total_frames, metadata.duration);
///     Ok(())
/// }
/// ```
pub struct Cptv;

impl Cptv {
    /// Spawn a worker with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker does not become ready in time.
    pub async fn spawn<E: DecodeEngine>(context: E::Context) -> Result<CptvPlayer> {
        Self::spawn_with_config::<E>(context, DecoderConfig::default()).await
    }

    /// Spawn a worker with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the worker does not become
    /// ready in time.
    pub async fn spawn_with_config<E: DecodeEngine>(
        context: E::Context,
        config: DecoderConfig,
    ) -> Result<CptvPlayer> {
        CptvPlayer::spawn::<E, _>(async move { Ok(context) }, config).await
    }

    /// Spawn a worker that loads its engine context itself.
    ///
    /// Use this when preparing the decoder is expensive (fetching or
    /// compiling a decoder module, say): `load_context` runs on the worker
    /// task, once, and the player is returned only after it succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if `load_context` fails, or does not finish within
    /// the configured ready timeout.
    pub async fn spawn_with_loader<E, F>(
        load_context: F,
        config: DecoderConfig,
    ) -> Result<CptvPlayer>
    where
        E: DecodeEngine,
        F: Future<Output = Result<E::Context>> + Send + 'static,
    {
        CptvPlayer::spawn::<E, F>(load_context, config).await
    }
}
