//! Per-tile comparison of template chunks against the live canvas.
//!
//! Both the live tile and the union of the tile's chunks are rasterized onto
//! equally sized canvases scaled by the analyzer's draw multiplier, then
//! every logical pixel in the chunks' bounding rectangle is classified by
//! sampling the centre sub-pixel of its block. Chunks built with another
//! multiplier are rescaled first:
//!
//! | Template          | Live                 | Outcome                     |
//! |-------------------|----------------------|-----------------------------|
//! | alpha < 128       | alpha > 0            | grief-clean (if enabled)    |
//! | alpha > 128       | alpha < 128          | new placement               |
//! | alpha > 128       | other nearest colour | colour correction           |
//! | anything else     |                      | no candidate                |

use std::collections::HashMap;

use canvas_palette::{perceptual_distance, Palette, TRANSPARENT_ID};
use serde::Serialize;

use super::chunk_index::TileChunk;
use crate::error::EngineError;
use crate::models::{PixelCoords, TileCoords, WriteCandidate};
use crate::rendering::{Rgba, RgbaImage};

/// Fixed priority of erasing paint where the template is transparent.
pub const GRIEF_PRIORITY: f64 = 2_000_000.0;

/// Base priority of painting a pixel that is still blank.
pub const PLACEMENT_PRIORITY: f64 = 1_000_000.0;

/// Upper bound of the centre bonus added to placements and corrections.
pub const CENTER_BONUS: f64 = 500_000.0;

/// ΔE00 scale for corrections.
pub const DELTA_E_SCALE: f64 = 5_000.0;

/// Cap on the scaled ΔE00 so corrections stay below placements.
pub const CORRECTION_CAP: f64 = 499_999.0;

/// Below this alpha a pixel counts as transparent; above it as opaque.
const HALF_ALPHA: u8 = 128;

/// Per-tile pixel tally from one analysis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileReport {
    /// Opaque template pixels already showing the right colour
    pub correct: usize,
    /// Opaque template pixels over blank canvas
    pub missing: usize,
    /// Opaque template pixels showing another colour
    pub wrong: usize,
    /// Painted pixels where the template is transparent (only counted when
    /// transparent pixels are analyzed)
    pub griefed: usize,
}

impl TileReport {
    /// Opaque template pixels covered by this report.
    pub fn template_pixels(&self) -> usize {
        self.correct + self.missing + self.wrong
    }

    pub fn merge(&mut self, other: &TileReport) {
        self.correct += other.correct;
        self.missing += other.missing;
        self.wrong += other.wrong;
        self.griefed += other.griefed;
    }
}

/// Candidates and tally for one tile.
#[derive(Debug, Clone, Default)]
pub struct TileAnalysis {
    pub candidates: Vec<WriteCandidate>,
    pub report: TileReport,
}

/// Tile-local rectangle in logical (unscaled) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    fn bounding(chunks: &[TileChunk<'_>]) -> Option<Rect> {
        let mut iter = chunks.iter().map(|c| {
            (
                c.pixel.x,
                c.pixel.y,
                c.pixel.x + c.width(),
                c.pixel.y + c.height(),
            )
        });
        let first = iter.next()?;
        let (x0, y0, x1, y1) = iter.fold(first, |(ax0, ay0, ax1, ay1), (x0, y0, x1, y1)| {
            (ax0.min(x0), ay0.min(y0), ax1.max(x1), ay1.max(y1))
        });
        (x1 > x0 && y1 > y0).then_some(Rect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }
}

/// Classifies the pixels of one tile against the template chunks on it.
#[derive(Debug, Clone, Copy)]
pub struct TileAnalyzer<'p> {
    palette: &'p Palette,
    draw_multiplier: u32,
    analyze_transparent: bool,
}

impl<'p> TileAnalyzer<'p> {
    pub fn new(palette: &'p Palette, draw_multiplier: u32, analyze_transparent: bool) -> Self {
        Self {
            palette,
            draw_multiplier: draw_multiplier.max(1),
            analyze_transparent,
        }
    }

    /// Decode a live tile PNG and analyze it.
    ///
    /// An undecodable tile is an error; no candidates are produced from it.
    pub fn analyze_png(
        &self,
        tile_png: &[u8],
        chunks: &[TileChunk<'_>],
        tile: TileCoords,
    ) -> Result<TileAnalysis, EngineError> {
        let live = RgbaImage::decode_png(tile_png)?;
        Ok(self.analyze(&live, chunks, tile))
    }

    pub fn analyze(
        &self,
        live: &RgbaImage,
        chunks: &[TileChunk<'_>],
        tile: TileCoords,
    ) -> TileAnalysis {
        let m = self.draw_multiplier;
        let Some(rect) = Rect::bounding(chunks) else {
            return TileAnalysis::default();
        };

        // Both canvases cover `rect`, scaled by m.
        let mut template = RgbaImage::new(rect.width * m, rect.height * m);
        for chunk in chunks {
            let rescaled;
            let bitmap = if chunk.draw_multiplier == m {
                chunk.bitmap
            } else {
                rescaled = chunk.bitmap.downscale(chunk.draw_multiplier).upscale(m);
                &rescaled
            };
            template.overlay(
                bitmap,
                (chunk.pixel.x - rect.x) * m,
                (chunk.pixel.y - rect.y) * m,
            );
        }
        let live = live.crop(rect.x, rect.y, rect.width, rect.height).upscale(m);

        let centre_x = rect.width as f64 / 2.0;
        let centre_y = rect.height as f64 / 2.0;
        let max_radius = centre_x.hypot(centre_y);

        let mut memo: HashMap<u32, u8> = HashMap::new();
        let mut out = TileAnalysis::default();
        let sample = m / 2;

        for y in 0..rect.height {
            for x in 0..rect.width {
                let t = template.get(x * m + sample, y * m + sample);
                let l = live.get(x * m + sample, y * m + sample);
                let pixel = PixelCoords::new(rect.x + x, rect.y + y);

                if t.a < HALF_ALPHA {
                    if self.analyze_transparent && l.a > 0 {
                        out.report.griefed += 1;
                        out.candidates.push(WriteCandidate::new(
                            tile,
                            pixel,
                            TRANSPARENT_ID,
                            GRIEF_PRIORITY,
                        ));
                    }
                    continue;
                }
                if t.a == HALF_ALPHA {
                    continue;
                }

                let target = *memo
                    .entry(t.key())
                    .or_insert_with(|| self.palette.nearest(t.rgb()));
                let bonus = {
                    let dx = x as f64 + 0.5 - centre_x;
                    let dy = y as f64 + 0.5 - centre_y;
                    (1.0 - (dx.hypot(dy) / max_radius).min(1.0)) * CENTER_BONUS
                };

                if l.a < HALF_ALPHA {
                    out.report.missing += 1;
                    out.candidates.push(WriteCandidate::new(
                        tile,
                        pixel,
                        target,
                        PLACEMENT_PRIORITY + bonus,
                    ));
                } else if self.palette.nearest(l.rgb()) != target {
                    out.report.wrong += 1;
                    out.candidates.push(WriteCandidate::new(
                        tile,
                        pixel,
                        target,
                        correction_priority(l, t) + bonus,
                    ));
                } else {
                    out.report.correct += 1;
                }
            }
        }

        tracing::debug!(
            tile = %tile,
            chunks = chunks.len(),
            candidates = out.candidates.len(),
            correct = out.report.correct,
            "Analyzed tile"
        );
        out
    }
}

fn correction_priority(live: Rgba, template: Rgba) -> f64 {
    (perceptual_distance(live.rgb(), template.rgb()) * DELTA_E_SCALE).min(CORRECTION_CAP)
}
