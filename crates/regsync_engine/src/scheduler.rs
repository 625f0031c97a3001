//! Periodic pass trigger.

use crate::error::{SyncError, SyncResult};
use crate::processor::{PassOutcome, SyncProcessor};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Runs passes of a processor on a fixed interval.
///
/// Passes run on tokio's blocking pool. A tick that fires while a pass is
/// still running is skipped rather than queued.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    processor: Arc<SyncProcessor>,
    interval: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler with an explicit interval.
    pub fn new(processor: Arc<SyncProcessor>, interval: Duration) -> Self {
        Self {
            processor,
            interval,
        }
    }

    /// Creates a scheduler using the processor's configured interval.
    pub fn from_config(processor: Arc<SyncProcessor>) -> Self {
        let interval = processor.config().sync_interval;
        Self::new(processor, interval)
    }

    /// The interval between ticks.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one tick: prepares the processor if needed, then tries a pass.
    ///
    /// # Errors
    ///
    /// Returns an error if preparation fails or the blocking task dies.
    pub async fn tick(&self) -> SyncResult<PassOutcome> {
        let processor = Arc::clone(&self.processor);
        task::spawn_blocking(move || -> SyncResult<PassOutcome> {
            if !processor.is_prepared() {
                processor.prepare()?;
            }
            Ok(processor.try_process())
        })
        .await
        .map_err(|e| SyncError::synchronizer(format!("pass task failed: {e}")))?
    }

    /// Ticks until `shutdown` resolves. Returns the number of passes that
    /// ran to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the interval is zero. Failures of
    /// individual ticks are logged and do not stop the loop.
    pub async fn run<F>(self, shutdown: F) -> SyncResult<u64>
    where
        F: Future<Output = ()>,
    {
        if self.interval.is_zero() {
            return Err(SyncError::Config(
                "sync interval must be greater than zero".into(),
            ));
        }

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_ms = self.interval.as_millis() as u64, "scheduler started");
        let mut completed: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.tick().await {
                    Ok(PassOutcome::Completed(_)) => completed += 1,
                    Ok(PassOutcome::Skipped(reason)) => debug!(reason = ?reason, "scheduled pass skipped"),
                    Err(e) => error!(error = %e, "scheduled pass failed"),
                },
            }
        }

        info!(completed, "scheduler stopped");
        Ok(completed)
    }
}
