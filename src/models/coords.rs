use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TemplateError;

/// Tile index on the canvas grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoords {
    pub x: u32,
    pub y: u32,
}

impl TileCoords {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Pixel offset inside one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelCoords {
    pub x: u32,
    pub y: u32,
}

impl PixelCoords {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PixelCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Absolute position of a template's top-left pixel.
///
/// Text form is `"tx, ty, px, py"`, the same form used in persisted
/// template files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub tile: TileCoords,
    pub pixel: PixelCoords,
}

impl Placement {
    pub const fn new(tile_x: u32, tile_y: u32, pixel_x: u32, pixel_y: u32) -> Self {
        Self {
            tile: TileCoords::new(tile_x, tile_y),
            pixel: PixelCoords::new(pixel_x, pixel_y),
        }
    }

    /// The in-tile offset must lie inside a tile of `tile_size` pixels.
    pub fn validate(&self, tile_size: u32) -> Result<(), TemplateError> {
        if self.pixel.x >= tile_size || self.pixel.y >= tile_size {
            return Err(TemplateError::InvalidPlacement(format!(
                "pixel offset {} outside a {tile_size}px tile",
                self.pixel
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.tile.x, self.tile.y, self.pixel.x, self.pixel.y
        )
    }
}

impl FromStr for Placement {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = parse_u32_list(s, 4)
            .ok_or_else(|| TemplateError::InvalidPlacement(s.to_string()))?;
        Ok(Placement::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

impl Serialize for Placement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Key of one template chunk: the tile it lies on and its offset in that tile.
///
/// Text form is `"TTTT,TTTT,PPP,PPP"` (tile indices zero-padded to four
/// digits, offsets to three), so all chunks on a tile share a string prefix.
/// Ordering is by tile first, which keeps a tile's chunks adjacent in sorted
/// maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    pub tile: TileCoords,
    pub pixel: PixelCoords,
}

impl ChunkKey {
    pub const fn new(tile: TileCoords, pixel: PixelCoords) -> Self {
        Self { tile, pixel }
    }

    /// String prefix shared by every chunk key on `tile`.
    pub fn tile_prefix(tile: TileCoords) -> String {
        format!("{:04},{:04},", tile.x, tile.y)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04},{:04},{:03},{:03}",
            self.tile.x, self.tile.y, self.pixel.x, self.pixel.y
        )
    }
}

impl FromStr for ChunkKey {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts =
            parse_u32_list(s, 4).ok_or_else(|| TemplateError::InvalidChunkKey(s.to_string()))?;
        Ok(ChunkKey::new(
            TileCoords::new(parts[0], parts[1]),
            PixelCoords::new(parts[2], parts[3]),
        ))
    }
}

fn parse_u32_list(s: &str, expected: usize) -> Option<Vec<u32>> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    (parts.len() == expected).then_some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_display_is_zero_padded() {
        let key = ChunkKey::new(TileCoords::new(2, 31), PixelCoords::new(10, 990));
        assert_eq!(key.to_string(), "0002,0031,010,990");
    }

    #[test]
    fn test_chunk_key_parse() {
        let key: ChunkKey = "0002,0031,010,990".parse().unwrap();
        assert_eq!(key.tile, TileCoords::new(2, 31));
        assert_eq!(key.pixel, PixelCoords::new(10, 990));
    }

    #[test]
    fn test_chunk_key_parse_rejects_garbage() {
        assert!("0002,0031,010".parse::<ChunkKey>().is_err());
        assert!("a,b,c,d".parse::<ChunkKey>().is_err());
        assert!("1,2,3,4,5".parse::<ChunkKey>().is_err());
    }

    #[test]
    fn test_tile_prefix_matches_keys() {
        let tile = TileCoords::new(7, 8);
        let key = ChunkKey::new(tile, PixelCoords::new(0, 4));
        assert!(key.to_string().starts_with(&ChunkKey::tile_prefix(tile)));
        let other = ChunkKey::new(TileCoords::new(7, 80), PixelCoords::new(0, 4));
        assert!(!other.to_string().starts_with(&ChunkKey::tile_prefix(tile)));
    }

    #[test]
    fn test_placement_round_trip_text() {
        let placement: Placement = "2, 3, 10, 990".parse().unwrap();
        assert_eq!(placement, Placement::new(2, 3, 10, 990));
        assert_eq!(placement.to_string(), "2, 3, 10, 990");
    }

    #[test]
    fn test_placement_validate() {
        assert!(Placement::new(0, 0, 999, 0).validate(1000).is_ok());
        assert!(matches!(
            Placement::new(0, 0, 1000, 0).validate(1000),
            Err(TemplateError::InvalidPlacement(_))
        ));
    }

    #[test]
    fn test_placement_serde_as_string() {
        let json = serde_json::to_string(&Placement::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "\"1, 2, 3, 4\"");
        let back: Placement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Placement::new(1, 2, 3, 4));
    }
}
