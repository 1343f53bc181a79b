//! Template sets on disk: create, persist, reload and reconcile against a
//! directory of tiles.

mod common;

use canvas_palette::Palette;
use common::{fixtures, fixtures::colors};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tileward::error::TemplateError;
use tileward::models::{Placement, Template, TemplateCollection, TemplateSet, TileCoords};
use tileward::rendering::RgbaImage;
use tileward::services::{reconcile, schedule, DirTileSource, TileAnalyzer};

/// Two overlapping templates: blue underneath, a red stripe on top.
fn layered() -> TemplateCollection {
    let mut templates = TemplateCollection::new();
    let blue = Template::from_image(
        "sky",
        "7",
        templates.next_sort_id(),
        Placement::new(3, 4, 0, 0),
        &fixtures::solid(4, 4, colors::BLUE),
        1000,
        3,
    )
    .unwrap();
    templates.insert(blue);

    let red = Template::from_image(
        "stripe",
        "7",
        templates.next_sort_id(),
        Placement::new(3, 4, 0, 1),
        &fixtures::solid(4, 1, colors::RED),
        1000,
        3,
    )
    .unwrap();
    templates.insert(red);
    templates
}

#[tokio::test]
async fn test_persisted_set_reloads_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.json");

    let templates = layered();
    templates.to_set().unwrap().save(&path).await.unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
    assert_eq!(json["schemaVersion"], "1.0.0");
    assert_eq!(json["templates"]["0 7"]["coords"], "3, 4, 0, 0");
    assert_eq!(json["templates"]["1 7"]["name"], "stripe");
    assert!(json["templates"]["1 7"]["tiles"]["0003,0004,000,001"].is_string());

    let reloaded = TemplateCollection::from_set(&TemplateSet::load(&path).await.unwrap(), 3).unwrap();
    assert_eq!(reloaded.len(), 2);
    for (a, b) in templates.iter().zip(reloaded.iter()) {
        assert_eq!(a.storage_key(), b.storage_key());
        assert_eq!(a.chunks(), b.chunks());
        assert_eq!(a.pixel_count(), b.pixel_count());
    }
}

#[tokio::test]
async fn test_reconcile_against_tile_directory() {
    let dir = tempfile::tempdir().unwrap();
    // Tile (3, 4): the blue layer is painted everywhere, stripe missing
    let mut tile = RgbaImage::new(1000, 1000);
    for y in 0..4 {
        for x in 0..4 {
            tile.put(x, y, colors::BLUE);
        }
    }
    tokio::fs::create_dir_all(dir.path().join("3")).await.unwrap();
    tokio::fs::write(dir.path().join("3").join("4.png"), tile.encode_png().unwrap())
        .await
        .unwrap();

    let templates = layered();
    let analyzer = TileAnalyzer::new(Palette::canvas(), 3, false);
    let summary = reconcile(&DirTileSource::new(dir.path()), &templates, &analyzer).await;

    // The stripe draws over the sky, so its row needs repainting red
    let progress = summary.progress();
    assert_eq!(progress.correct, 12);
    assert_eq!(progress.wrong, 4);
    assert!(summary.candidates.iter().all(|c| c.color_id == 7));
    assert!(summary
        .candidates
        .iter()
        .all(|c| c.tile_coords == TileCoords::new(3, 4) && c.pixel_coords.y == 1));

    let plan = schedule(
        &summary.candidates,
        &Palette::canvas().free_colors(),
        3,
        &mut StdRng::seed_from_u64(5),
    );
    let batches = common::assert_batches(&plan);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
}

#[tokio::test]
async fn test_other_schema_major_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.json");
    tokio::fs::write(&path, r#"{"schemaVersion": "2.1.0", "templates": {}}"#)
        .await
        .unwrap();

    let result = TemplateSet::load(&path).await;
    assert!(matches!(result, Err(TemplateError::SchemaVersion { .. })));
}

#[tokio::test]
async fn test_corrupt_chunk_fails_the_load() {
    let mut set = layered().to_set().unwrap();
    let record = set.templates.get_mut("0 7").unwrap();
    for data in record.tiles.values_mut() {
        *data = "bm90IGEgcG5n".to_string(); // "not a png"
    }

    let result = TemplateCollection::from_set(&set, 3);
    assert!(matches!(result, Err(TemplateError::Raster(_))));
}

#[tokio::test]
async fn test_reload_keeps_multiplier_templates_were_built_with() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("templates.json");
    let templates = layered();
    templates.to_set().unwrap().save(&path).await.unwrap();

    // The engine now runs at 1x; the saved chunks are still 3x
    let reloaded = TemplateCollection::from_set(&TemplateSet::load(&path).await.unwrap(), 1).unwrap();
    assert_eq!(reloaded.total_pixels(), templates.total_pixels());
    assert!(reloaded.iter().all(|t| t.draw_multiplier() == 3));

    let analyzer = TileAnalyzer::new(Palette::canvas(), 1, false);
    let summary = reconcile(&DirTileSource::new(dir.path()), &reloaded, &analyzer).await;
    assert_eq!(summary.candidates.len(), 16);
    assert!(summary
        .candidates
        .iter()
        .all(|c| c.pixel_coords.x < 4 && c.pixel_coords.y < 4));
}
