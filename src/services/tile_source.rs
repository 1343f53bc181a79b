use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

use super::ports::{TileData, TileSource};
use crate::error::EngineError;
use crate::models::TileCoords;

/// Tiles from the canvas backend: `GET {base}/files/s0/tiles/{x}/{y}.png`.
///
/// The backend answers 404 for tiles nobody has painted yet; those are
/// returned as [`TileData::Blank`].
#[derive(Debug, Clone)]
pub struct HttpTileSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTileSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn tile_url(&self, tile: TileCoords) -> String {
        format!("{}/files/s0/tiles/{}/{}.png", self.base_url, tile.x, tile.y)
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch_tile(&self, tile: TileCoords) -> Result<TileData, EngineError> {
        let url = self.tile_url(tile);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!(tile = %tile, "Tile not painted yet");
                Ok(TileData::Blank)
            }
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                tracing::debug!(tile = %tile, bytes = bytes.len(), "Fetched tile");
                Ok(TileData::Png(bytes.to_vec()))
            }
            status => Err(EngineError::TransientIo(format!(
                "GET {url} returned {status}"
            ))),
        }
    }
}

/// Tiles from a directory laid out as `{dir}/{x}/{y}.png`.
///
/// Missing files are blank tiles.
#[derive(Debug, Clone)]
pub struct DirTileSource {
    dir: PathBuf,
}

impl DirTileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn tile_path(&self, tile: TileCoords) -> PathBuf {
        self.dir
            .join(tile.x.to_string())
            .join(format!("{}.png", tile.y))
    }
}

#[async_trait]
impl TileSource for DirTileSource {
    async fn fetch_tile(&self, tile: TileCoords) -> Result<TileData, EngineError> {
        match tokio::fs::read(self.tile_path(tile)).await {
            Ok(bytes) => Ok(TileData::Png(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TileData::Blank),
            Err(e) => Err(e.into()),
        }
    }
}
