//! 256-entry RGBA lookup tables for colourising thermal frames

use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Number of entries in every colour map.
pub const COLOUR_MAP_LEN: usize = 256;

/// Which palette a [`ColourMap`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ColourMapName {
    /// Ironbow-style black through purple, red and yellow to white
    #[default]
    Default,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Greyscale,
    /// Greyscale with intensity squared, darkening the cool end
    GreyscaleSquared,
}

impl ColourMapName {
    pub const ALL: [ColourMapName; 7] = [
        ColourMapName::Default,
        ColourMapName::Viridis,
        ColourMapName::Plasma,
        ColourMapName::Inferno,
        ColourMapName::Magma,
        ColourMapName::Greyscale,
        ColourMapName::GreyscaleSquared,
    ];

    /// The shared table for this palette.
    pub fn colour_map(self) -> &'static ColourMap {
        ColourMap::get(self)
    }
}

impl fmt::Display for ColourMapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColourMapName::Default => "Default",
            ColourMapName::Viridis => "Viridis",
            ColourMapName::Plasma => "Plasma",
            ColourMapName::Inferno => "Inferno",
            ColourMapName::Magma => "Magma",
            ColourMapName::Greyscale => "Greyscale",
            ColourMapName::GreyscaleSquared => "Greyscale squared",
        };
        write!(f, "{}", name)
    }
}

/// Immutable RGBA lookup table.
///
/// Tables are built on first use and shared for the life of the process:
///
/// ```rust
/// use cptv_player::render::{ColourMap, ColourMapName};
///
/// let viridis = ColourMap::get(ColourMapName::Viridis);
/// assert_eq!(viridis.entry(0), [0x44, 0x01, 0x54, 0xff]);
/// assert!(std::ptr::eq(viridis, ColourMapName::Viridis.colour_map()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ColourMap {
    name: ColourMapName,
    entries: [[u8; 4]; COLOUR_MAP_LEN],
}

static DEFAULT: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_stops(ColourMapName::Default, IRONBOW));
static VIRIDIS: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_stops(ColourMapName::Viridis, VIRIDIS_STOPS));
static PLASMA: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_stops(ColourMapName::Plasma, PLASMA_STOPS));
static INFERNO: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_stops(ColourMapName::Inferno, INFERNO_STOPS));
static MAGMA: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_stops(ColourMapName::Magma, MAGMA_STOPS));
static GREYSCALE: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_fn(ColourMapName::Greyscale, |t| t));
static GREYSCALE_SQUARED: LazyLock<ColourMap> =
    LazyLock::new(|| ColourMap::from_fn(ColourMapName::GreyscaleSquared, |t| t * t));

const IRONBOW: &[u32] =
    &[0x000000, 0x20008c, 0x8f00a0, 0xcf2b5c, 0xf56d0f, 0xfcb100, 0xffe84a, 0xffffff];

const VIRIDIS_STOPS: &[u32] = &[
    0x440154, 0x482878, 0x3e4989, 0x31688e, 0x26828e, 0x1f9e89, 0x35b779, 0x6ece58, 0xb5de2b,
    0xfde725,
];

const PLASMA_STOPS: &[u32] = &[
    0x0d0887, 0x46039f, 0x7201a8, 0x9c179e, 0xbd3786, 0xd8576b, 0xed7953, 0xfb9f3a, 0xfdca26,
    0xf0f921,
];

const INFERNO_STOPS: &[u32] = &[
    0x000004, 0x1b0c41, 0x4a0c6b, 0x781c6d, 0xa52c60, 0xcf4446, 0xed6925, 0xfb9b06, 0xf7d13d,
    0xfcffa4,
];

const MAGMA_STOPS: &[u32] = &[
    0x000004, 0x180f3d, 0x440f76, 0x721f81, 0x9e2f7f, 0xcd4071, 0xf1605d, 0xfd9668, 0xfeca8d,
    0xfcfdbf,
];

impl ColourMap {
    /// The shared table for `name`.
    pub fn get(name: ColourMapName) -> &'static ColourMap {
        match name {
            ColourMapName::Default => &*DEFAULT,
            ColourMapName::Viridis => &*VIRIDIS,
            ColourMapName::Plasma => &*PLASMA,
            ColourMapName::Inferno => &*INFERNO,
            ColourMapName::Magma => &*MAGMA,
            ColourMapName::Greyscale => &*GREYSCALE,
            ColourMapName::GreyscaleSquared => &*GREYSCALE_SQUARED,
        }
    }

    /// Every built-in table, in [`ColourMapName::ALL`] order.
    pub fn all() -> impl Iterator<Item = &'static ColourMap> {
        ColourMapName::ALL.into_iter().map(ColourMap::get)
    }

    /// Linear interpolation between evenly spaced `0xRRGGBB` stops.
    fn from_stops(name: ColourMapName, stops: &[u32]) -> Self {
        let last_segment = stops.len().saturating_sub(2);
        let mut entries = [[0, 0, 0, 0xff]; COLOUR_MAP_LEN];

        for (i, entry) in entries.iter_mut().enumerate() {
            let position = i as f64 / (COLOUR_MAP_LEN - 1) as f64 * (stops.len() - 1) as f64;
            let segment = (position.floor() as usize).min(last_segment);
            let frac = position - segment as f64;

            let from = rgb(stops[segment]);
            let to = rgb(stops[(segment + 1).min(stops.len() - 1)]);
            for channel in 0..3 {
                let value = f64::from(from[channel])
                    + (f64::from(to[channel]) - f64::from(from[channel])) * frac;
                entry[channel] = value.round() as u8;
            }
        }

        Self { name, entries }
    }

    /// Grey ramp where `intensity` maps `[0, 1]` to `[0, 1]`.
    fn from_fn(name: ColourMapName, intensity: fn(f64) -> f64) -> Self {
        let mut entries = [[0, 0, 0, 0xff]; COLOUR_MAP_LEN];
        for (i, entry) in entries.iter_mut().enumerate() {
            let t = i as f64 / (COLOUR_MAP_LEN - 1) as f64;
            let level = (intensity(t) * 255.0).round() as u8;
            *entry = [level, level, level, 0xff];
        }
        Self { name, entries }
    }

    pub fn name(&self) -> ColourMapName {
        self.name
    }

    /// RGBA at `index`.
    pub fn entry(&self, index: u8) -> [u8; 4] {
        self.entries[usize::from(index)]
    }

    pub fn entries(&self) -> &[[u8; 4]; COLOUR_MAP_LEN] {
        &self.entries
    }
}

impl fmt::Debug for ColourMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColourMap")
            .field("name", &self.name)
            .field("first", &self.entries[0])
            .field("last", &self.entries[COLOUR_MAP_LEN - 1])
            .finish()
    }
}

fn rgb(packed: u32) -> [u8; 3] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palettes_start_and_end_on_their_stops() {
        let viridis = ColourMap::get(ColourMapName::Viridis);
        assert_eq!(viridis.entry(0), [0x44, 0x01, 0x54, 0xff]);
        assert_eq!(viridis.entry(255), [0xfd, 0xe7, 0x25, 0xff]);

        let magma = ColourMap::get(ColourMapName::Magma);
        assert_eq!(magma.entry(255), [0xfc, 0xfd, 0xbf, 0xff]);
    }

    #[test]
    fn every_entry_is_opaque() {
        for map in ColourMap::all() {
            let opaque = map.entries().iter().all(|e| e[3] == 0xff);
            assert!(opaque, "{} has a transparent entry", map.name());
        }
    }

    #[test]
    fn greyscale_is_linear_and_squared_is_darker() {
        let grey = ColourMap::get(ColourMapName::Greyscale);
        let squared = ColourMap::get(ColourMapName::GreyscaleSquared);

        assert_eq!(grey.entry(128), [128, 128, 128, 0xff]);
        assert_eq!(squared.entry(0), [0, 0, 0, 0xff]);
        assert_eq!(squared.entry(255), [255, 255, 255, 0xff]);
        assert!(squared.entry(128)[0] < grey.entry(128)[0]);
    }

    #[test]
    fn tables_are_built_once() {
        for name in ColourMapName::ALL {
            assert!(std::ptr::eq(ColourMap::get(name), name.colour_map()));
            assert_eq!(ColourMap::get(name).name(), name);
        }
    }

    #[test]
    fn names_round_trip_through_serde() {
        let yaml = serde_yaml_ng::to_string(&ColourMapName::GreyscaleSquared).unwrap();
        assert_eq!(yaml.trim(), "greyscale_squared");
        let name: ColourMapName = serde_yaml_ng::from_str("inferno").unwrap();
        assert_eq!(name, ColourMapName::Inferno);
    }
}
