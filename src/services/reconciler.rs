use futures_util::future::join_all;
use std::collections::BTreeMap;

use super::chunk_index::{ChunkIndex, TileChunk};
use super::ports::{TileData, TileSource};
use super::tile_diff::{TileAnalysis, TileAnalyzer, TileReport};
use crate::error::EngineError;
use crate::models::{TemplateCollection, TileCoords, WriteCandidate};
use crate::rendering::RgbaImage;

/// Result of analyzing every tile the enabled templates touch.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub candidates: Vec<WriteCandidate>,
    pub reports: BTreeMap<TileCoords, TileReport>,
    /// Tiles that could not be fetched or decoded, with the reason
    pub failed: Vec<(TileCoords, String)>,
}

impl ReconcileSummary {
    /// Pixel tally over all analyzed tiles.
    pub fn progress(&self) -> TileReport {
        let mut total = TileReport::default();
        for report in self.reports.values() {
            total.merge(report);
        }
        total
    }

    /// Tiles attempted, analyzed or not.
    pub fn tiles(&self) -> usize {
        self.reports.len() + self.failed.len()
    }

    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.reports.is_empty()
    }
}

/// Fetch and analyze every tile touched by the enabled templates.
///
/// Tiles are processed concurrently. A tile that fails to fetch or decode is
/// logged and contributes no candidates; it never aborts the other tiles.
pub async fn reconcile(
    source: &dyn TileSource,
    templates: &TemplateCollection,
    analyzer: &TileAnalyzer<'_>,
) -> ReconcileSummary {
    let index = ChunkIndex::from_templates(templates);
    if index.is_empty() {
        tracing::debug!("No enabled templates to reconcile");
        return ReconcileSummary::default();
    }

    let results = join_all(
        index
            .tiles()
            .map(|tile| analyze_tile(source, analyzer, index.chunks_for(tile), tile)),
    )
    .await;

    let mut summary = ReconcileSummary::default();
    for (tile, result) in results {
        match result {
            Ok(analysis) => {
                summary.candidates.extend(analysis.candidates);
                summary.reports.insert(tile, analysis.report);
            }
            Err(e) => {
                tracing::warn!(tile = %tile, error = %e, "Skipping tile");
                summary.failed.push((tile, e.to_string()));
            }
        }
    }

    let progress = summary.progress();
    tracing::info!(
        tiles = summary.tiles(),
        failed = summary.failed.len(),
        candidates = summary.candidates.len(),
        correct = progress.correct,
        total = progress.template_pixels(),
        "Reconciled templates"
    );
    summary
}

async fn analyze_tile(
    source: &dyn TileSource,
    analyzer: &TileAnalyzer<'_>,
    chunks: &[TileChunk<'_>],
    tile: TileCoords,
) -> (TileCoords, Result<TileAnalysis, EngineError>) {
    let result = match source.fetch_tile(tile).await {
        Ok(TileData::Png(bytes)) => analyzer.analyze_png(&bytes, chunks, tile),
        // Out-of-bounds reads are transparent, so an empty raster is a blank tile
        Ok(TileData::Blank) => Ok(analyzer.analyze(&RgbaImage::new(0, 0), chunks, tile)),
        Err(e) => Err(e),
    };
    (tile, result)
}
