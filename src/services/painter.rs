//! Autonomous execution controller.
//!
//! One cycle waits for the paint session to become ready and for a write
//! opportunity, triggers it and races its completion against cancellation.
//! A successful cycle is followed by a cooldown with the network-paused flag
//! raised, then a full environment restart. Retryable failures back off
//! under the same flag and retry; too many in a row force the restart
//! immediately. Malformed input stops the painter without a retry.
//!
//! Every wait polls the running flag at `poll_interval`, so `stop()` takes
//! effect within one tick and never triggers a restart. Only one loop runs
//! per painter at a time.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::ports::{
    CycleCompletion, CycleReport, EnvironmentReset, PaintSession, SharedFlag, StatusSink,
};
use crate::error::EngineError;
use crate::models::PainterConfig;

/// Snapshot of the controller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionState {
    pub is_running: bool,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
}

/// Why [`AutoPainter::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped by the user, or never started
    Stopped,
    /// A restart was requested from the host
    Restarted,
    /// A cycle hit an error that retrying cannot fix
    Aborted,
    /// Another `run()` is already driving this painter
    AlreadyRunning,
}

pub struct AutoPainter {
    session: Arc<dyn PaintSession>,
    running: Arc<dyn SharedFlag>,
    network_paused: Arc<dyn SharedFlag>,
    status: Arc<dyn StatusSink>,
    reset: Arc<dyn EnvironmentReset>,
    config: PainterConfig,
    failures: AtomicU32,
    looping: AtomicBool,
}

impl AutoPainter {
    pub fn new(
        session: Arc<dyn PaintSession>,
        running: Arc<dyn SharedFlag>,
        network_paused: Arc<dyn SharedFlag>,
        status: Arc<dyn StatusSink>,
        reset: Arc<dyn EnvironmentReset>,
        config: PainterConfig,
    ) -> Self {
        Self {
            session,
            running,
            network_paused,
            status,
            reset,
            config,
            failures: AtomicU32::new(0),
            looping: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ExecutionState {
        ExecutionState {
            is_running: self.running.get(),
            consecutive_failures: self.failures.load(Ordering::SeqCst),
            failure_threshold: self.config.failure_threshold,
        }
    }

    /// Idle -> Running. Returns false if already running.
    pub fn start(&self) -> bool {
        if self.running.get() {
            return false;
        }
        self.failures.store(0, Ordering::SeqCst);
        self.running.set(true);
        self.status.notify("Painter started");
        true
    }

    /// Running -> Idle at the next cancellation check.
    pub fn stop(&self) {
        if !self.running.get() {
            return;
        }
        self.running.set(false);
        self.status.notify("Painter stopped");
    }

    /// Drive cycles until stopped or a restart is requested.
    pub async fn run(&self) -> RunOutcome {
        if self.looping.swap(true, Ordering::SeqCst) {
            tracing::warn!("Painter loop is already running");
            return RunOutcome::AlreadyRunning;
        }
        let _looping = LoopGuard(&self.looping);

        loop {
            if !self.running.get() {
                return RunOutcome::Stopped;
            }

            match self.cycle().await {
                Ok(report) => {
                    self.failures.store(0, Ordering::SeqCst);
                    self.status.notify(&success_message(&report));

                    if self.pause(self.config.cooldown()).await.is_err() {
                        return RunOutcome::Stopped;
                    }
                    tracing::info!("Cooldown over, restarting for a clean cycle");
                    self.reset.force_restart();
                    return RunOutcome::Restarted;
                }
                Err(e) if e.is_cancelled() => return RunOutcome::Stopped,
                Err(e) if !e.is_retryable() => {
                    tracing::error!(error = %e, "Paint cycle failed, not retrying");
                    self.running.set(false);
                    self.status.notify(&format!("Painter stopped: {e}"));
                    return RunOutcome::Aborted;
                }
                Err(e) => {
                    let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::warn!(error = %e, failures, "Paint cycle failed");

                    if failures >= self.config.failure_threshold {
                        self.status.notify(&format!(
                            "{failures} failures in a row ({e}), restarting"
                        ));
                        self.failures.store(0, Ordering::SeqCst);
                        self.reset.force_restart();
                        return RunOutcome::Restarted;
                    }

                    self.status.notify(&format!(
                        "Cycle failed ({failures}/{}): {e}; retrying in {}s",
                        self.config.failure_threshold,
                        self.config.backoff().as_secs()
                    ));
                    if self.pause(self.config.backoff()).await.is_err() {
                        return RunOutcome::Stopped;
                    }
                }
            }
        }
    }

    async fn cycle(&self) -> Result<CycleReport, EngineError> {
        let session = self.session.as_ref();
        self.wait_for("paint session", self.config.element_timeout(), || {
            session.is_ready()
        })
        .await?;
        self.wait_for(
            "paint opportunity",
            self.config.opportunity_timeout(),
            || session.has_opportunity(),
        )
        .await?;

        let completion = session.trigger().await?;
        self.await_completion(completion).await
    }

    /// Poll `ready` every tick until it holds, the timeout passes or the
    /// painter is stopped.
    async fn wait_for<F, Fut>(
        &self,
        what: &'static str,
        timeout: Duration,
        mut ready: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let started = Instant::now();
        loop {
            if !self.running.get() {
                return Err(EngineError::Cancelled);
            }
            if ready().await {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(EngineError::Timeout { what, waited });
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// Race the cycle's completion against cancellation and
    /// `completion_timeout`. A stop observed at a tick wins; a completion
    /// that settled first is accepted.
    async fn await_completion(
        &self,
        mut completion: CycleCompletion,
    ) -> Result<CycleReport, EngineError> {
        let started = Instant::now();
        let timeout = self.config.completion_timeout();
        loop {
            if !self.running.get() {
                return Err(EngineError::Cancelled);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(EngineError::Timeout {
                    what: "cycle completion",
                    waited,
                });
            }
            tokio::select! {
                biased;
                result = &mut completion => {
                    return result.unwrap_or_else(|_| {
                        Err(EngineError::TransientIo("paint session dropped the cycle".into()))
                    });
                }
                _ = sleep(self.config.poll_interval().min(timeout - waited)) => {}
            }
        }
    }

    /// Sleep for `duration` with the network-paused flag raised. Returns
    /// `Cancelled` as soon as a tick sees the painter stopped.
    async fn pause(&self, duration: Duration) -> Result<(), EngineError> {
        self.network_paused.set(true);
        let deadline = Instant::now() + duration;
        let result = loop {
            if !self.running.get() {
                break Err(EngineError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                break Ok(());
            }
            sleep(self.config.poll_interval().min(deadline - now)).await;
        };
        self.network_paused.set(false);
        result
    }
}

/// Releases the loop slot when `run()` returns.
struct LoopGuard<'a>(&'a AtomicBool);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn success_message(report: &CycleReport) -> String {
    let progress = &report.progress;
    if report.exhausted {
        format!(
            "Nothing to paint, {} of {} pixels correct",
            progress.correct,
            progress.template_pixels()
        )
    } else {
        format!(
            "Painted {} pixels on {} tiles, {} queued, {} of {} pixels correct",
            report.written,
            report.tiles,
            report.queued,
            progress.correct,
            progress.template_pixels()
        )
    }
}
