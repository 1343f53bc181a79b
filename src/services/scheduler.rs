//! Budget-constrained selection of the writes to submit.
//!
//! Candidates are ranked by priority and sampled without replacement using
//! A-ES weighted reservoir keys (`u^(1/w)`), so higher-ranked candidates are
//! strongly favoured without the mechanical look of a strict top-K.

use canvas_palette::{ColorSet, TRANSPARENT_ID};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{PixelCoords, PixelKey, TileCoords, WriteCandidate};

/// Weight of the best-ranked candidate.
pub const MAX_WEIGHT: f64 = 3.0;

/// Weight of the worst-ranked candidate.
pub const MIN_WEIGHT: f64 = 1.0;

/// All writes for one tile, in selection order.
///
/// `coords` holds flattened `x, y` pairs; `colors[i]` belongs to
/// `coords[2 * i]`, `coords[2 * i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileBatch {
    pub tile: TileCoords,
    pub colors: Vec<u8>,
    pub coords: Vec<u32>,
}

impl TileBatch {
    fn new(tile: TileCoords) -> Self {
        Self {
            tile,
            colors: Vec::new(),
            coords: Vec::new(),
        }
    }

    fn push(&mut self, pixel: PixelCoords, color_id: u8) {
        self.colors.push(color_id);
        self.coords.push(pixel.x);
        self.coords.push(pixel.y);
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Pixel keys written by this batch.
    pub fn keys(&self) -> impl Iterator<Item = PixelKey> + '_ {
        self.coords
            .chunks_exact(2)
            .map(move |xy| (self.tile, PixelCoords::new(xy[0], xy[1])))
    }
}

/// Outcome of one scheduling pass.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan {
    /// Nothing usable to write, or no budget. Not an error; the caller may
    /// dispose of the budget some other way.
    Exhausted,
    Batches(Vec<TileBatch>),
}

impl WritePlan {
    /// Total number of pixel writes in the plan.
    pub fn write_count(&self) -> usize {
        match self {
            WritePlan::Exhausted => 0,
            WritePlan::Batches(batches) => batches.iter().map(TileBatch::len).sum(),
        }
    }
}

/// Weight of rank `index` among `count` candidates, linear from
/// [`MAX_WEIGHT`] (best) down to [`MIN_WEIGHT`] (worst).
pub fn rank_weight(index: usize, count: usize) -> f64 {
    if count <= 1 {
        return MAX_WEIGHT;
    }
    MAX_WEIGHT - (MAX_WEIGHT - MIN_WEIGHT) * index as f64 / (count - 1) as f64
}

/// Select up to `budget` writes from `candidates` and group them per tile.
///
/// Candidates whose colour is not in `available` are dropped; erasing
/// (id 0) is always allowed. The result is deterministic for a given `rng`
/// state.
pub fn schedule<R: Rng + ?Sized>(
    candidates: &[WriteCandidate],
    available: &ColorSet,
    budget: i64,
    rng: &mut R,
) -> WritePlan {
    let mut usable: Vec<&WriteCandidate> = candidates
        .iter()
        .filter(|c| c.color_id == TRANSPARENT_ID || available.contains(c.color_id))
        .collect();

    if usable.is_empty() || budget <= 0 {
        tracing::debug!(
            candidates = candidates.len(),
            usable = usable.len(),
            budget,
            "Nothing to schedule"
        );
        return WritePlan::Exhausted;
    }

    usable.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(Ordering::Equal));

    let count = usable.len();
    let mut keyed: Vec<(f64, &WriteCandidate)> = usable
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let u: f64 = rng.gen();
            (u.powf(1.0 / rank_weight(i, count)), c)
        })
        .collect();

    let take = (budget as usize).min(count);
    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    keyed.truncate(take);

    let mut batches: Vec<TileBatch> = Vec::new();
    for (_, c) in keyed {
        match batches.iter_mut().find(|b| b.tile == c.tile_coords) {
            Some(batch) => batch.push(c.pixel_coords, c.color_id),
            None => {
                let mut batch = TileBatch::new(c.tile_coords);
                batch.push(c.pixel_coords, c.color_id);
                batches.push(batch);
            }
        }
    }

    tracing::debug!(
        usable = count,
        selected = take,
        tiles = batches.len(),
        "Scheduled writes"
    );
    WritePlan::Batches(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn candidate(tile: (u32, u32), pixel: (u32, u32), color: u8, priority: f64) -> WriteCandidate {
        WriteCandidate::new(
            TileCoords::new(tile.0, tile.1),
            PixelCoords::new(pixel.0, pixel.1),
            color,
            priority,
        )
    }

    fn all_colors() -> ColorSet {
        ColorSet::from_ids(0..64)
    }

    #[test]
    fn test_rank_weights() {
        assert_eq!(rank_weight(0, 1), 3.0);
        assert_eq!(rank_weight(0, 5), 3.0);
        assert_eq!(rank_weight(2, 5), 2.0);
        assert_eq!(rank_weight(4, 5), 1.0);
    }

    #[test]
    fn test_unavailable_colors_are_dropped_but_erase_is_kept() {
        let candidates = vec![
            candidate((0, 0), (1, 1), 40, 10.0),
            candidate((0, 0), (2, 2), 0, 5.0),
        ];
        let available = ColorSet::from_ids([1, 2, 3]);
        let mut rng = StdRng::seed_from_u64(7);

        let plan = schedule(&candidates, &available, 10, &mut rng);
        let WritePlan::Batches(batches) = plan else {
            panic!("expected batches");
        };
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].colors, vec![0]);
        assert_eq!(batches[0].coords, vec![2, 2]);
    }

    #[test]
    fn test_exhausted_without_budget_or_candidates() {
        let mut rng = StdRng::seed_from_u64(1);
        let candidates = vec![candidate((0, 0), (1, 1), 5, 1.0)];

        assert_eq!(schedule(&candidates, &all_colors(), 0, &mut rng), WritePlan::Exhausted);
        assert_eq!(schedule(&candidates, &all_colors(), -3, &mut rng), WritePlan::Exhausted);
        assert_eq!(schedule(&[], &all_colors(), 5, &mut rng), WritePlan::Exhausted);
        assert_eq!(
            schedule(&candidates, &ColorSet::from_ids([0, 1]), 5, &mut rng),
            WritePlan::Exhausted
        );
    }

    #[test]
    fn test_selects_min_of_budget_and_candidates() {
        let candidates: Vec<_> = (0..10)
            .map(|i| candidate((0, 0), (i, 0), 5, i as f64))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);

        assert_eq!(schedule(&candidates, &all_colors(), 4, &mut rng).write_count(), 4);
        assert_eq!(schedule(&candidates, &all_colors(), 50, &mut rng).write_count(), 10);
    }

    #[test]
    fn test_groups_by_tile_with_paired_coords() {
        let candidates = vec![
            candidate((1, 0), (3, 4), 5, 3.0),
            candidate((2, 0), (5, 6), 7, 2.0),
            candidate((1, 0), (7, 8), 9, 1.0),
        ];
        let mut rng = StdRng::seed_from_u64(11);

        let WritePlan::Batches(batches) = schedule(&candidates, &all_colors(), 3, &mut rng) else {
            panic!("expected batches");
        };
        assert_eq!(batches.len(), 2);
        for batch in &batches {
            assert_eq!(batch.coords.len(), batch.colors.len() * 2);
            for (key, color) in batch.keys().zip(&batch.colors) {
                let source = candidates.iter().find(|c| c.key() == key).unwrap();
                assert_eq!(source.color_id, *color);
            }
        }
    }

    #[test]
    fn test_same_seed_same_plan() {
        let candidates: Vec<_> = (0..30)
            .map(|i| candidate((i % 3, 0), (i, i), 5, (30 - i) as f64))
            .collect();

        let a = schedule(&candidates, &all_colors(), 7, &mut StdRng::seed_from_u64(42));
        let b = schedule(&candidates, &all_colors(), 7, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_weighted_sampling_favours_priority() {
        let candidates: Vec<_> = (0..50)
            .map(|i| candidate((0, 0), (i, 0), 5, (1000 - i) as f64))
            .collect();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut hits = [0usize; 50];

        for _ in 0..10_000 {
            let WritePlan::Batches(batches) = schedule(&candidates, &all_colors(), 1, &mut rng)
            else {
                panic!("expected batches");
            };
            hits[batches[0].coords[0] as usize] += 1;
        }

        // Expected rates are 3% for the best and 1% for the worst
        let (best, worst) = (hits[0], hits[49]);
        assert!(worst > 0, "worst candidate never selected");
        assert!(best > worst * 2, "best {best} vs worst {worst}");
        assert!(best < 10_000, "selection must stay random");
    }
}
