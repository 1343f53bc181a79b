use serde::{Deserialize, Serialize};

use super::coords::{PixelCoords, TileCoords};

/// Identity of one canvas pixel: the tile and the offset inside it.
pub type PixelKey = (TileCoords, PixelCoords);

/// A proposed single-pixel write with its priority.
///
/// Produced fresh by each analysis pass and never mutated afterwards; later
/// stages only filter, sort and consume candidates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCandidate {
    pub tile_coords: TileCoords,
    pub pixel_coords: PixelCoords,
    pub color_id: u8,
    pub priority: f64,
}

impl WriteCandidate {
    pub fn new(tile: TileCoords, pixel: PixelCoords, color_id: u8, priority: f64) -> Self {
        Self {
            tile_coords: tile,
            pixel_coords: pixel,
            color_id,
            priority,
        }
    }

    #[inline]
    pub fn key(&self) -> PixelKey {
        (self.tile_coords, self.pixel_coords)
    }
}
