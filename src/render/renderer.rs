//! Min/max normalisation of raw samples into RGBA pixels

use tracing::warn;

use super::colour_map::{COLOUR_MAP_LEN, ColourMap};
use crate::{CptvError, Result};

const MAX_INDEX: i64 = COLOUR_MAP_LEN as i64 - 1;

/// Lookup index for `sample`, before clamping.
///
/// `ceil((sample - min) / (max - min) * 255)`, so `min` lands on entry 0 and
/// `max` on entry 255. A degenerate range maps everything to entry 0.
pub fn colour_index(sample: u16, min: f64, max: f64) -> i64 {
    let range = max - min;
    if !(range > 0.0) {
        return 0;
    }
    (((f64::from(sample) - min) / range) * MAX_INDEX as f64).ceil() as i64
}

/// Colourise `samples` into a new RGBA buffer of `samples.len() * 4` bytes.
///
/// Samples outside `[min, max]` are clamped to the first or last colour and
/// a single warning is logged for the frame.
pub fn render_frame(samples: &[u16], colour_map: &ColourMap, min: f64, max: f64) -> Vec<u8> {
    let mut rgba = vec![0; samples.len() * 4];
    render_into(&mut rgba, samples, colour_map, min, max);
    rgba
}

/// [`render_frame`] into a caller-provided buffer.
///
/// Returns how many samples had to be clamped.
///
/// # Panics
///
/// If `rgba` is not exactly `samples.len() * 4` bytes long.
pub fn render_into(
    rgba: &mut [u8],
    samples: &[u16],
    colour_map: &ColourMap,
    min: f64,
    max: f64,
) -> usize {
    assert_eq!(rgba.len(), samples.len() * 4, "RGBA buffer does not match sample count");

    let entries = colour_map.entries();
    let mut clamped = 0;
    let mut first_clamped = None;
    for (pixel, &sample) in rgba.chunks_exact_mut(4).zip(samples) {
        let index = colour_index(sample, min, max);
        let lookup = index.clamp(0, MAX_INDEX);
        if lookup != index {
            clamped += 1;
            first_clamped.get_or_insert((index, sample));
        }
        pixel.copy_from_slice(&entries[lookup as usize]);
    }

    if let Some((index, sample)) = first_clamped {
        warn!(
            "Clamped {} samples outside [{}, {}] (first: sample {} at index {})",
            clamped, min, max, sample, index
        );
    }
    clamped
}

/// Like [`render_frame`] but fails on the first sample outside `[min, max]`.
pub fn try_render_frame(
    samples: &[u16],
    colour_map: &ColourMap,
    min: f64,
    max: f64,
) -> Result<Vec<u8>> {
    let entries = colour_map.entries();
    let mut rgba = Vec::with_capacity(samples.len() * 4);
    for &sample in samples {
        let value = f64::from(sample);
        let index = colour_index(sample, min, max);
        if value < min || value > max || !(0..=MAX_INDEX).contains(&index) {
            return Err(CptvError::RenderRange { index, sample, min, max });
        }
        rgba.extend_from_slice(&entries[index as usize]);
    }
    Ok(rgba)
}
