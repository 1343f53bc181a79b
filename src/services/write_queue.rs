use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::EngineError;
use crate::models::{PixelKey, WriteCandidate};

/// The authoritative list of pending writes, highest priority first.
///
/// Repeated analysis passes may enqueue the same pixel more than once;
/// [`WriteQueue::dedup_by_pixel`] collapses those, and
/// [`WriteQueue::remove_submitted`] drops every entry for a pixel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteQueue {
    entries: Vec<WriteCandidate>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue contents with a fresh analysis result.
    pub fn replace(&mut self, mut candidates: Vec<WriteCandidate>) {
        candidates.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        self.entries = candidates;
    }

    /// Keep only the highest-priority entry per pixel.
    pub fn dedup_by_pixel(&mut self) {
        let mut seen = HashSet::new();
        self.entries.retain(|c| seen.insert(c.key()));
    }

    /// Remove every entry for the given pixels. Keys that are not queued
    /// are ignored. Returns how many entries were removed.
    pub fn remove_submitted(&mut self, keys: impl IntoIterator<Item = PixelKey>) -> usize {
        let keys: HashSet<PixelKey> = keys.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|c| !keys.contains(&c.key()));
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[WriteCandidate] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteCandidate> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending writes per palette id.
    pub fn color_counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.entries {
            *counts.entry(c.color_id).or_insert(0) += 1;
        }
        counts
    }

    pub async fn load(path: &Path) -> Result<Self, EngineError> {
        let json = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&json).map_err(|e| {
            EngineError::MalformedInput(format!("write queue {}: {e}", path.display()))
        })
    }

    /// Load the queue, starting empty when the file does not exist yet.
    pub async fn load_or_default(path: &Path) -> Result<Self, EngineError> {
        match Self::load(path).await {
            Err(EngineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), EngineError> {
        let json = serde_json::to_string(self)
            .map_err(|e| EngineError::MalformedInput(format!("write queue: {e}")))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
