use async_trait::async_trait;
use canvas_palette::{ColorSet, Palette};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, RwLock};

use super::ports::{
    AccountSource, CycleCompletion, CycleReport, PaintSession, TileSource, WriteChannel,
};
use super::reconciler::reconcile;
use super::scheduler::{schedule, WritePlan};
use super::tile_diff::TileAnalyzer;
use super::write_queue::WriteQueue;
use crate::error::EngineError;
use crate::models::template::OPAQUE_ALPHA;
use crate::models::{EngineConfig, PixelCoords, TemplateCollection, TileCoords};

/// Paint session backed by the engine itself: reconcile, schedule, submit.
///
/// Each trigger runs one cycle on a spawned task. Only one cycle runs at a
/// time; the session reports not-ready while a cycle is in flight.
#[derive(Clone)]
pub struct EnginePaintSession {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    templates: RwLock<TemplateCollection>,
    queue: tokio::sync::Mutex<WriteQueue>,
    tiles: Arc<dyn TileSource>,
    writer: Arc<dyn WriteChannel>,
    account: Arc<dyn AccountSource>,
    rng: Mutex<StdRng>,
    busy: AtomicBool,
}

impl EnginePaintSession {
    pub fn new(
        config: EngineConfig,
        templates: TemplateCollection,
        tiles: Arc<dyn TileSource>,
        writer: Arc<dyn WriteChannel>,
        account: Arc<dyn AccountSource>,
    ) -> Self {
        Self::with_rng(config, templates, tiles, writer, account, StdRng::from_entropy())
    }

    /// Same as [`EnginePaintSession::new`] with a fixed random source.
    pub fn with_rng(
        config: EngineConfig,
        templates: TemplateCollection,
        tiles: Arc<dyn TileSource>,
        writer: Arc<dyn WriteChannel>,
        account: Arc<dyn AccountSource>,
        rng: StdRng,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                templates: RwLock::new(templates),
                queue: tokio::sync::Mutex::new(WriteQueue::new()),
                tiles,
                writer,
                account,
                rng: Mutex::new(rng),
                busy: AtomicBool::new(false),
            }),
        }
    }

    /// Start from a previously saved queue.
    pub async fn restore_queue(&self, queue: WriteQueue) {
        *self.inner.queue.lock().await = queue;
    }

    pub async fn queue(&self) -> WriteQueue {
        self.inner.queue.lock().await.clone()
    }

    /// Swap the active template set.
    pub async fn replace_templates(&self, templates: TemplateCollection) {
        *self.inner.templates.write().await = templates;
    }

    /// Run one cycle on the current task.
    pub async fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        self.inner.run_cycle().await
    }
}

impl Inner {
    async fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        let account = self.account.account().await?;
        let budget = account.budget(self.config.reserved_charges);

        let templates = self.templates.read().await;
        let analyzer = TileAnalyzer::new(
            Palette::canvas(),
            self.config.draw_multiplier,
            self.config.analyze_transparent_pixels,
        );
        let summary = reconcile(self.tiles.as_ref(), &templates, &analyzer).await;
        if summary.all_failed() {
            return Err(EngineError::TransientIo(format!(
                "all {} tiles failed, first: {}",
                summary.failed.len(),
                summary.failed[0].1
            )));
        }

        let mut queue = self.queue.lock().await;
        queue.replace(summary.candidates.clone());
        queue.dedup_by_pixel();

        let plan = {
            let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
            schedule(queue.entries(), &account.available, budget, &mut *rng)
        };

        let mut report = CycleReport {
            progress: summary.progress(),
            ..Default::default()
        };

        match plan {
            WritePlan::Exhausted => {
                report.exhausted = true;
                if self.config.burn_when_exhausted && budget > 0 {
                    if let Some((tile, pixel, color)) = burn_target(&templates, &account.available)
                    {
                        self.writer
                            .submit(tile, &[color], &[pixel.x, pixel.y], &account.token)
                            .await?;
                        tracing::info!(
                            tile = %tile,
                            pixel = %pixel,
                            color,
                            "Spent a charge on a finished pixel"
                        );
                    }
                }
            }
            WritePlan::Batches(batches) => {
                for batch in &batches {
                    if let Err(e) = self
                        .writer
                        .submit(batch.tile, &batch.colors, &batch.coords, &account.token)
                        .await
                    {
                        tracing::warn!(
                            tile = %batch.tile,
                            written = report.written,
                            tiles = report.tiles,
                            error = %e,
                            "Write failed, unsent pixels stay queued"
                        );
                        self.save_queue(&queue).await;
                        return Err(e);
                    }
                    queue.remove_submitted(batch.keys());
                    report.written += batch.len();
                    report.tiles += 1;
                }
            }
        }
        report.queued = queue.len();
        self.save_queue(&queue).await;

        tracing::info!(
            written = report.written,
            tiles = report.tiles,
            queued = report.queued,
            exhausted = report.exhausted,
            "Paint cycle finished"
        );
        Ok(report)
    }

    async fn save_queue(&self, queue: &WriteQueue) {
        if let Some(path) = &self.config.queue_file {
            if let Err(e) = queue.save(path).await {
                tracing::warn!(error = %e, path = %path.display(), "Failed to save write queue");
            }
        }
    }
}

/// First opaque pixel of the first enabled template whose colour the account
/// can use. Repainting it with the template colour is harmless.
fn burn_target(
    templates: &TemplateCollection,
    available: &ColorSet,
) -> Option<(TileCoords, PixelCoords, u8)> {
    let palette = Palette::canvas();
    for template in templates.iter().filter(|t| t.enabled) {
        let m = template.draw_multiplier();
        for (key, bitmap) in template.chunks() {
            for y in 0..bitmap.height() / m {
                for x in 0..bitmap.width() / m {
                    let px = bitmap.get(x * m + m / 2, y * m + m / 2);
                    if px.a <= OPAQUE_ALPHA {
                        continue;
                    }
                    let color = palette.nearest(px.rgb());
                    if available.contains(color) {
                        let pixel = PixelCoords::new(key.pixel.x + x, key.pixel.y + y);
                        return Some((key.tile, pixel, color));
                    }
                }
            }
        }
    }
    None
}

/// Clears the busy flag when the cycle task ends, however it ends.
struct BusyGuard(Arc<Inner>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaintSession for EnginePaintSession {
    async fn is_ready(&self) -> bool {
        !self.inner.busy.load(Ordering::SeqCst)
    }

    async fn has_opportunity(&self) -> bool {
        match self.inner.account.account().await {
            Ok(account) => account.budget(self.inner.config.reserved_charges) > 0,
            Err(e) => {
                tracing::debug!(error = %e, "Account unavailable");
                false
            }
        }
    }

    async fn trigger(&self) -> Result<CycleCompletion, EngineError> {
        if self.inner.busy.swap(true, Ordering::SeqCst) {
            return Err(EngineError::TransientIo(
                "a paint cycle is already running".into(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let guard = BusyGuard(self.inner.clone());
        tokio::spawn(async move {
            let result = guard.0.run_cycle().await;
            drop(guard);
            // The controller may have stopped listening
            let _ = tx.send(result);
        });
        Ok(rx)
    }
}
