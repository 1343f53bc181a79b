//! Interfaces to the collaborators around the engine, plus the small
//! in-process adapters that need no I/O.

use async_trait::async_trait;
use canvas_palette::ColorSet;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

use super::tile_diff::TileReport;
use crate::error::EngineError;
use crate::models::TileCoords;

/// Live state of one tile as served by the canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileData {
    /// Encoded PNG
    Png(Vec<u8>),
    /// Never painted; every pixel is transparent
    Blank,
}

/// Source of live canvas tiles.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch_tile(&self, tile: TileCoords) -> Result<TileData, EngineError>;
}

/// Remote pixel write endpoint. Never retries on its own.
#[async_trait]
pub trait WriteChannel: Send + Sync {
    /// Paint `colors[i]` at `coords[2i], coords[2i+1]` on `tile`.
    async fn submit(
        &self,
        tile: TileCoords,
        colors: &[u8],
        coords: &[u32],
        token: &str,
    ) -> Result<(), EngineError>;
}

/// What the current account may spend.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    /// Charges currently available
    pub charges: u32,
    /// Palette ids the account may paint with
    pub available: ColorSet,
    /// Write authorization token
    pub token: String,
}

impl AccountSnapshot {
    /// Writes allowed this pass after holding back `reserved` charges.
    pub fn budget(&self, reserved: u32) -> i64 {
        self.charges as i64 - reserved as i64
    }
}

#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn account(&self) -> Result<AccountSnapshot, EngineError>;
}

/// Outcome of one completed paint cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Pixels submitted
    pub written: usize,
    /// Tiles that received writes
    pub tiles: usize,
    /// Nothing was schedulable (no usable candidates or no budget)
    pub exhausted: bool,
    /// Writes still queued after the cycle
    pub queued: usize,
    /// Pixel tally over every analyzed tile
    pub progress: TileReport,
}

/// Completion signal of a triggered cycle.
pub type CycleCompletion = oneshot::Receiver<Result<CycleReport, EngineError>>;

/// The environment that actually performs a paint cycle.
#[async_trait]
pub trait PaintSession: Send + Sync {
    /// The session can accept a trigger.
    async fn is_ready(&self) -> bool;

    /// A write opportunity exists (charges are available).
    async fn has_opportunity(&self) -> bool;

    /// Start one cycle. The returned receiver resolves when it completes.
    async fn trigger(&self) -> Result<CycleCompletion, EngineError>;
}

/// A boolean shared with other collaborators.
pub trait SharedFlag: Send + Sync {
    fn get(&self) -> bool;
    fn set(&self, value: bool);
}

/// One-way sink for human-readable status lines. Must not block.
pub trait StatusSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Host hook that restarts the whole environment from a clean state.
pub trait EnvironmentReset: Send + Sync {
    fn force_restart(&self);
}

#[derive(Debug, Default)]
pub struct AtomicFlag(AtomicBool);

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self(AtomicBool::new(value))
    }
}

impl SharedFlag for AtomicFlag {
    fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Status lines as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn notify(&self, message: &str) {
        tracing::info!(status = message, "Painter status");
    }
}

/// Status lines fanned out to any number of subscribers.
///
/// Sending never blocks; lagging or absent subscribers just miss messages.
#[derive(Debug, Clone)]
pub struct BroadcastStatus {
    sender: broadcast::Sender<String>,
}

impl BroadcastStatus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

impl StatusSink for BroadcastStatus {
    fn notify(&self, message: &str) {
        // No subscribers is fine
        let _ = self.sender.send(message.to_string());
    }
}

/// Fixed account state.
#[derive(Debug, Clone)]
pub struct StaticAccount(pub AccountSnapshot);

#[async_trait]
impl AccountSource for StaticAccount {
    async fn account(&self) -> Result<AccountSnapshot, EngineError> {
        Ok(self.0.clone())
    }
}

/// Restart hook for a supervised process: stops the painter loop and
/// records the request so the host can exit and be restarted.
pub struct ExitOnRestart {
    running: Arc<dyn SharedFlag>,
    requests: AtomicUsize,
}

impl ExitOnRestart {
    pub fn new(running: Arc<dyn SharedFlag>) -> Self {
        Self {
            running,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of restarts requested so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl EnvironmentReset for ExitOnRestart {
    fn force_restart(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.running.set(false);
        tracing::warn!("Restart requested, stopping painter");
    }
}
