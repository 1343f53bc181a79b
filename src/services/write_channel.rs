use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::ports::WriteChannel;
use crate::error::EngineError;
use crate::models::TileCoords;

/// Request body of a pixel write.
#[derive(Debug, Serialize)]
struct PaintRequest<'a> {
    colors: &'a [u8],
    coords: &'a [u32],
    t: &'a str,
}

/// Writes through the canvas backend: `POST {base}/s0/pixel/{x}/{y}`.
#[derive(Debug, Clone)]
pub struct HttpWriteChannel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWriteChannel {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn pixel_url(&self, tile: TileCoords) -> String {
        format!("{}/s0/pixel/{}/{}", self.base_url, tile.x, tile.y)
    }
}

#[async_trait]
impl WriteChannel for HttpWriteChannel {
    async fn submit(
        &self,
        tile: TileCoords,
        colors: &[u8],
        coords: &[u32],
        token: &str,
    ) -> Result<(), EngineError> {
        if coords.len() != colors.len() * 2 {
            return Err(EngineError::MalformedInput(format!(
                "{} colors for {} coordinates",
                colors.len(),
                coords.len()
            )));
        }

        let url = self.pixel_url(tile);
        let response = self
            .client
            .post(&url)
            .json(&PaintRequest {
                colors,
                coords,
                t: token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::TransientIo(format!(
                "POST {url} returned {status}: {body}"
            )));
        }

        tracing::info!(tile = %tile, pixels = colors.len(), "Submitted writes");
        Ok(())
    }
}
