//! Slicing template images into tile-aligned chunks, and grouping the
//! chunks of a template collection by the tile they fall on.

use std::collections::BTreeMap;

use crate::error::TemplateError;
use crate::models::{ChunkKey, PixelCoords, Placement, Template, TileCoords};
use crate::rendering::RgbaImage;

/// Slice `image`, placed at `placement`, into one bitmap per touched tile.
///
/// Each chunk covers the part of the image inside one tile and is upscaled
/// by `draw_multiplier`, so every template pixel becomes an N×N block whose
/// centre sub-pixel can be sampled without picking up neighbouring colours.
pub fn build_chunks(
    image: &RgbaImage,
    tile_size: u32,
    draw_multiplier: u32,
    placement: Placement,
) -> Result<BTreeMap<ChunkKey, RgbaImage>, TemplateError> {
    if image.is_empty() {
        return Err(TemplateError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    if draw_multiplier == 0 || draw_multiplier % 2 == 0 {
        return Err(TemplateError::InvalidMultiplier(draw_multiplier));
    }
    placement.validate(tile_size)?;

    let mut chunks = BTreeMap::new();

    let mut y = 0;
    while y < image.height() {
        let abs_y = placement.pixel.y + y;
        let tile_y = placement.tile.y + abs_y / tile_size;
        let local_y = abs_y % tile_size;
        let chunk_h = (tile_size - local_y).min(image.height() - y);

        let mut x = 0;
        while x < image.width() {
            let abs_x = placement.pixel.x + x;
            let tile_x = placement.tile.x + abs_x / tile_size;
            let local_x = abs_x % tile_size;
            let chunk_w = (tile_size - local_x).min(image.width() - x);

            let key = ChunkKey::new(
                TileCoords::new(tile_x, tile_y),
                PixelCoords::new(local_x, local_y),
            );
            let bitmap = image.crop(x, y, chunk_w, chunk_h).upscale(draw_multiplier);
            chunks.insert(key, bitmap);

            x += chunk_w;
        }
        y += chunk_h;
    }

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        placement = %placement,
        chunks = chunks.len(),
        "Built template chunks"
    );

    Ok(chunks)
}

/// One chunk as seen from the tile it lies on.
#[derive(Debug, Clone, Copy)]
pub struct TileChunk<'a> {
    /// Offset of the chunk's top-left pixel inside the tile
    pub pixel: PixelCoords,
    /// Chunk bitmap, already scaled by `draw_multiplier`
    pub bitmap: &'a RgbaImage,
    /// Multiplier the owning template was built with
    pub draw_multiplier: u32,
}

impl TileChunk<'_> {
    /// Width of the chunk in canvas pixels.
    pub fn width(&self) -> u32 {
        self.bitmap.width() / self.draw_multiplier.max(1)
    }

    /// Height of the chunk in canvas pixels.
    pub fn height(&self) -> u32 {
        self.bitmap.height() / self.draw_multiplier.max(1)
    }
}

/// Chunks of every enabled template, grouped per tile.
///
/// Within a tile, chunks keep the order of the templates they came from, so
/// a later template is drawn over an earlier one where they overlap.
#[derive(Debug, Default)]
pub struct ChunkIndex<'a> {
    by_tile: BTreeMap<TileCoords, Vec<TileChunk<'a>>>,
}

impl<'a> ChunkIndex<'a> {
    pub fn from_templates(templates: impl IntoIterator<Item = &'a Template>) -> Self {
        let mut by_tile: BTreeMap<TileCoords, Vec<TileChunk<'a>>> = BTreeMap::new();
        for template in templates.into_iter().filter(|t| t.enabled) {
            for (key, bitmap) in template.chunks() {
                by_tile.entry(key.tile).or_default().push(TileChunk {
                    pixel: key.pixel,
                    bitmap,
                    draw_multiplier: template.draw_multiplier(),
                });
            }
        }
        Self { by_tile }
    }

    pub fn tiles(&self) -> impl Iterator<Item = TileCoords> + '_ {
        self.by_tile.keys().copied()
    }

    pub fn tile_count(&self) -> usize {
        self.by_tile.len()
    }

    pub fn chunks_for(&self, tile: TileCoords) -> &[TileChunk<'a>] {
        self.by_tile.get(&tile).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.by_tile.is_empty()
    }
}
