//! HTTP tile source and write channel against a mock canvas.

mod common;

use common::{fixtures, fixtures::colors, MockCanvas};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tileward::error::EngineError;
use tileward::models::TileCoords;
use tileward::rendering::RgbaImage;
use tileward::services::{HttpTileSource, HttpWriteChannel, TileData, TileSource, WriteChannel};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_fetch_painted_tile() {
    let canvas = MockCanvas::start().await;
    let png = fixtures::tile_png(&[(4, 5, colors::RED)]);
    canvas.mock_tile(2, 3, png.clone()).await;

    let source = HttpTileSource::new(canvas.url(), TIMEOUT).unwrap();
    let data = source.fetch_tile(TileCoords::new(2, 3)).await.unwrap();
    assert_eq!(data, TileData::Png(png.clone()));

    let TileData::Png(bytes) = data else {
        unreachable!()
    };
    let tile = RgbaImage::decode_png(&bytes).unwrap();
    assert_eq!(tile.get(4, 5), colors::RED);
}

#[tokio::test]
async fn test_unpainted_tile_is_blank() {
    let canvas = MockCanvas::start().await;
    // Unmatched requests get a 404

    let source = HttpTileSource::new(canvas.url(), TIMEOUT).unwrap();
    let data = source.fetch_tile(TileCoords::new(9, 9)).await.unwrap();
    assert_eq!(data, TileData::Blank);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let canvas = MockCanvas::start().await;
    canvas.mock_tile_error(1, 1, 503).await;

    let source = HttpTileSource::new(canvas.url(), TIMEOUT).unwrap();
    let result = source.fetch_tile(TileCoords::new(1, 1)).await;
    assert!(
        matches!(result, Err(EngineError::TransientIo(ref msg)) if msg.contains("503")),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    // Nothing listens on port 9 (discard) in the test environment
    let source = HttpTileSource::new("http://127.0.0.1:9", TIMEOUT).unwrap();
    let result = source.fetch_tile(TileCoords::new(0, 0)).await;
    assert!(matches!(result, Err(EngineError::TransientIo(_))));
}

#[tokio::test]
async fn test_submit_posts_paired_colors_and_coords() {
    let canvas = MockCanvas::start().await;
    canvas.mock_paint(2, 3).await;

    let channel = HttpWriteChannel::new(canvas.url(), TIMEOUT).unwrap();
    channel
        .submit(TileCoords::new(2, 3), &[7, 0], &[10, 11, 12, 13], fixtures::TOKEN)
        .await
        .unwrap();

    let requests = canvas.paint_requests().await;
    assert_eq!(requests.len(), 1);
    let (path, body) = &requests[0];
    assert_eq!(path, "/s0/pixel/2/3");
    assert_eq!(common::assert_paint_body(body, fixtures::TOKEN), vec![7, 0]);
    assert_eq!(body["coords"], serde_json::json!([10, 11, 12, 13]));
}

#[tokio::test]
async fn test_rejected_write_is_transient() {
    let canvas = MockCanvas::start().await;
    canvas.mock_paint_status(0, 0, 403).await;

    let channel = HttpWriteChannel::new(canvas.url(), TIMEOUT).unwrap();
    let result = channel
        .submit(TileCoords::new(0, 0), &[5], &[1, 1], fixtures::TOKEN)
        .await;
    assert!(matches!(result, Err(EngineError::TransientIo(ref msg)) if msg.contains("403")));
}
