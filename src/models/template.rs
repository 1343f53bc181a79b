use base64::{engine::general_purpose::STANDARD, Engine};
use canvas_palette::Palette;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::coords::{ChunkKey, Placement, TileCoords};
use crate::error::TemplateError;
use crate::rendering::RgbaImage;
use crate::services::chunk_index::build_chunks;

/// Major schema version understood by this build.
pub const SCHEMA_MAJOR: u32 = 1;

/// Schema version written by this build.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Template pixels count as painted above this alpha.
pub const OPAQUE_ALPHA: u8 = 128;

/// A template: an image pinned to an absolute canvas position, stored as
/// pre-scaled per-tile chunks.
///
/// Bitmap data never changes after creation; replacing a template means
/// building a new one.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub author: String,
    /// Lower sorts first; later templates draw over earlier ones
    pub sort_id: u32,
    pub placement: Placement,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    draw_multiplier: u32,
    chunks: BTreeMap<ChunkKey, RgbaImage>,
    pixel_count: usize,
    color_usage: BTreeMap<u8, usize>,
}

impl Template {
    /// Build a template from a decoded image.
    pub fn from_image(
        name: impl Into<String>,
        author: impl Into<String>,
        sort_id: u32,
        placement: Placement,
        image: &RgbaImage,
        tile_size: u32,
        draw_multiplier: u32,
    ) -> Result<Self, TemplateError> {
        let chunks = build_chunks(image, tile_size, draw_multiplier, placement)?;
        Ok(Self::with_chunks(
            name.into(),
            author.into(),
            sort_id,
            placement,
            true,
            Utc::now(),
            draw_multiplier,
            chunks,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn with_chunks(
        name: String,
        author: String,
        sort_id: u32,
        placement: Placement,
        enabled: bool,
        created_at: DateTime<Utc>,
        draw_multiplier: u32,
        chunks: BTreeMap<ChunkKey, RgbaImage>,
    ) -> Self {
        let (pixel_count, color_usage) = tally_colors(&chunks, draw_multiplier);
        Self {
            name,
            author,
            sort_id,
            placement,
            enabled,
            created_at,
            draw_multiplier,
            chunks,
            pixel_count,
            color_usage,
        }
    }

    pub fn chunks(&self) -> &BTreeMap<ChunkKey, RgbaImage> {
        &self.chunks
    }

    /// Tiles touched by this template.
    pub fn tiles(&self) -> BTreeSet<TileCoords> {
        self.chunks.keys().map(|k| k.tile).collect()
    }

    pub fn draw_multiplier(&self) -> u32 {
        self.draw_multiplier
    }

    /// Number of opaque template pixels.
    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    /// Opaque pixel count per nearest palette id.
    pub fn color_usage(&self) -> &BTreeMap<u8, usize> {
        &self.color_usage
    }

    /// Key under which the template is persisted: `"<sortId> <author>"`.
    pub fn storage_key(&self) -> String {
        format!("{} {}", self.sort_id, self.author)
    }

    pub fn to_record(&self) -> Result<TemplateRecord, TemplateError> {
        let mut tiles = BTreeMap::new();
        for (key, bitmap) in &self.chunks {
            tiles.insert(key.to_string(), STANDARD.encode(bitmap.encode_png()?));
        }
        Ok(TemplateRecord {
            name: self.name.clone(),
            coords: self.placement,
            enabled: self.enabled,
            draw_multiplier: Some(self.draw_multiplier),
            created_at: Some(self.created_at),
            pixel_count: Some(self.pixel_count),
            tiles,
        })
    }

    /// Rebuild a template from its persisted record.
    ///
    /// The record's own draw multiplier wins; `default_multiplier` only
    /// applies to records written without one. Every chunk must decode and
    /// have dimensions that are a multiple of the multiplier.
    pub fn from_record(
        storage_key: &str,
        record: &TemplateRecord,
        default_multiplier: u32,
    ) -> Result<Self, TemplateError> {
        let (sort_id, author) = parse_storage_key(storage_key)?;
        let draw_multiplier = record.draw_multiplier.unwrap_or(default_multiplier);
        if draw_multiplier == 0 || draw_multiplier % 2 == 0 {
            return Err(TemplateError::InvalidMultiplier(draw_multiplier));
        }

        let mut chunks = BTreeMap::new();
        for (key, data) in &record.tiles {
            let key: ChunkKey = key.parse()?;
            let bitmap = RgbaImage::decode_png(&STANDARD.decode(data)?)?;
            if bitmap.is_empty()
                || bitmap.width() % draw_multiplier != 0
                || bitmap.height() % draw_multiplier != 0
            {
                return Err(TemplateError::InvalidChunkKey(format!(
                    "{key}: {}x{} is not a multiple of draw multiplier {draw_multiplier}",
                    bitmap.width(),
                    bitmap.height()
                )));
            }
            chunks.insert(key, bitmap);
        }

        let template = Self::with_chunks(
            record.name.clone(),
            author,
            sort_id,
            record.coords,
            record.enabled,
            record.created_at.unwrap_or_else(Utc::now),
            draw_multiplier,
            chunks,
        );
        if let Some(stored) = record.pixel_count {
            if stored != template.pixel_count {
                tracing::warn!(
                    template = %template.name,
                    stored,
                    counted = template.pixel_count,
                    "Stored pixel count differs from chunk data"
                );
            }
        }
        Ok(template)
    }
}

fn parse_storage_key(key: &str) -> Result<(u32, String), TemplateError> {
    let (sort_id, author) = key
        .split_once(' ')
        .ok_or_else(|| TemplateError::InvalidChunkKey(format!("template key {key:?}")))?;
    let sort_id = sort_id
        .parse()
        .map_err(|_| TemplateError::InvalidChunkKey(format!("template key {key:?}")))?;
    Ok((sort_id, author.to_string()))
}

/// Count opaque template pixels per palette id by sampling block centres.
fn tally_colors(
    chunks: &BTreeMap<ChunkKey, RgbaImage>,
    draw_multiplier: u32,
) -> (usize, BTreeMap<u8, usize>) {
    let palette = Palette::canvas();
    let mut usage = BTreeMap::new();
    let mut total = 0;
    let m = draw_multiplier.max(1);
    let centre = m / 2;

    for bitmap in chunks.values() {
        for y in 0..bitmap.height() / m {
            for x in 0..bitmap.width() / m {
                let px = bitmap.get(x * m + centre, y * m + centre);
                if px.a > OPAQUE_ALPHA {
                    total += 1;
                    *usage.entry(palette.nearest(px.rgb())).or_insert(0) += 1;
                }
            }
        }
    }
    (total, usage)
}

/// Persisted form of one template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub name: String,
    pub coords: Placement,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Scale of the chunk bitmaps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw_multiplier: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_count: Option<usize>,
    /// Chunk key -> base64 PNG
    pub tiles: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

/// Persisted template set: `{ schemaVersion, templates: { "<sortId> <author>": ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSet {
    pub schema_version: String,
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateRecord>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            templates: BTreeMap::new(),
        }
    }
}

impl TemplateSet {
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let set: Self = serde_json::from_str(json)?;
        set.check_version()?;
        Ok(set)
    }

    pub fn to_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, TemplateError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub async fn save(&self, path: &Path) -> Result<(), TemplateError> {
        tokio::fs::write(path, self.to_json()?).await?;
        Ok(())
    }

    fn check_version(&self) -> Result<(), TemplateError> {
        let major = self
            .schema_version
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok());
        if major != Some(SCHEMA_MAJOR) {
            return Err(TemplateError::SchemaVersion {
                found: self.schema_version.clone(),
                expected: SCHEMA_MAJOR,
            });
        }
        Ok(())
    }
}

/// The loaded templates, kept ordered by sort id.
#[derive(Debug, Clone, Default)]
pub struct TemplateCollection {
    templates: Vec<Template>,
}

impl TemplateCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild every template in `set`. A broken template fails the whole load.
    ///
    /// `default_multiplier` applies to records that do not store their own.
    pub fn from_set(set: &TemplateSet, default_multiplier: u32) -> Result<Self, TemplateError> {
        let mut collection = Self::new();
        for (key, record) in &set.templates {
            collection.insert(Template::from_record(key, record, default_multiplier)?);
        }
        tracing::info!(
            templates = collection.len(),
            pixels = collection.total_pixels(),
            "Loaded templates"
        );
        Ok(collection)
    }

    pub fn to_set(&self) -> Result<TemplateSet, TemplateError> {
        let mut set = TemplateSet::default();
        for template in &self.templates {
            set.templates
                .insert(template.storage_key(), template.to_record()?);
        }
        Ok(set)
    }

    /// Insert a template, replacing any template with the same storage key.
    pub fn insert(&mut self, template: Template) {
        let key = template.storage_key();
        self.templates.retain(|t| t.storage_key() != key);
        let pos = self
            .templates
            .partition_point(|t| t.sort_id <= template.sort_id);
        self.templates.insert(pos, template);
    }

    pub fn remove(&mut self, storage_key: &str) -> Option<Template> {
        let pos = self
            .templates
            .iter()
            .position(|t| t.storage_key() == storage_key)?;
        Some(self.templates.remove(pos))
    }

    /// Sort id for the next created template.
    pub fn next_sort_id(&self) -> u32 {
        self.templates
            .iter()
            .map(|t| t.sort_id + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn total_pixels(&self) -> usize {
        self.templates
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.pixel_count())
            .sum()
    }
}

impl<'a> IntoIterator for &'a TemplateCollection {
    type Item = &'a Template;
    type IntoIter = std::slice::Iter<'a, Template>;

    fn into_iter(self) -> Self::IntoIter {
        self.templates.iter()
    }
}
