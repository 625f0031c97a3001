//! Observable per-processor state: pass errors, synchronizer health and
//! statistics.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::error;
use uuid::Uuid;

/// Health of one synchronizer during the latest pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronizerHealth {
    /// A pass is using the synchronizer.
    Running,
    /// The last pass finished for the synchronizer.
    Succeeded,
    /// A handler panicked during the last pass.
    Failed,
}

impl fmt::Display for SynchronizerHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SynchronizerHealth::Running => "RUNNING",
            SynchronizerHealth::Succeeded => "SUCCEEDED",
            SynchronizerHealth::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Cumulative statistics about passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to completion.
    pub passes_completed: u64,
    /// Passes skipped by a guard.
    pub passes_skipped: u64,
    /// Definitions parsed successfully.
    pub definitions_parsed: u64,
    /// Definitions that failed to parse.
    pub definitions_broken: u64,
    /// Phase completions that succeeded.
    pub artifacts_processed: u64,
    /// Artifacts that failed or were left undepleted in some phase.
    pub artifacts_failed: u64,
    /// Artifacts cleaned up after their source file disappeared.
    pub artifacts_cleaned: u64,
    /// When the last pass finished.
    pub last_pass_time: Option<Instant>,
    /// How long the last pass took.
    pub last_pass_duration: Duration,
    /// Last error recorded by any pass.
    pub last_error: Option<String>,
}

/// Summary of one completed pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Identity of the pass, also present on its tracing span.
    pub pass_id: Uuid,
    /// Definitions queued by the walk.
    pub collected: usize,
    /// Definitions parsed successfully.
    pub parsed: usize,
    /// Definitions that failed to parse.
    pub broken: usize,
    /// Size of the artifact working set.
    pub artifacts: usize,
    /// Whether the phases ran.
    pub phases_run: bool,
    /// Artifacts cleaned up.
    pub cleaned: usize,
    /// Errors recorded during the pass.
    pub errors: Vec<String>,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl PassReport {
    /// Returns true if the pass recorded no errors.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Shared, readable state of a processor.
///
/// Writers are the pass in progress; readers may look at any time.
#[derive(Debug, Default)]
pub struct SyncContext {
    errors: RwLock<Vec<String>>,
    health: RwLock<BTreeMap<String, SynchronizerHealth>>,
    stats: RwLock<SyncStats>,
}

impl SyncContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors of the current or most recent pass.
    pub fn errors(&self) -> Vec<String> {
        self.errors.read().clone()
    }

    /// Synchronizer name → health.
    pub fn health(&self) -> BTreeMap<String, SynchronizerHealth> {
        self.health.read().clone()
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    pub(crate) fn clear_errors(&self) {
        self.errors.write().clear();
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        self.errors.write().push(message.into());
    }

    pub(crate) fn extend_errors(&self, messages: impl IntoIterator<Item = String>) {
        self.errors.write().extend(messages);
    }

    pub(crate) fn set_health(&self, name: &str, health: SynchronizerHealth) {
        self.health.write().insert(name.to_string(), health);
    }

    pub(crate) fn health_of(&self, name: &str) -> Option<SynchronizerHealth> {
        self.health.read().get(name).copied()
    }

    pub(crate) fn update_stats(&self, update: impl FnOnce(&mut SyncStats)) {
        update(&mut self.stats.write());
    }

    /// Logs every recorded error and remembers the last one.
    pub(crate) fn flush_errors(&self) {
        let errors = self.errors.read();
        for message in errors.iter() {
            error!(error = %message, "synchronization error");
        }
        if let Some(last) = errors.last() {
            self.stats.write().last_error = Some(last.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_accumulate_and_clear() {
        let context = SyncContext::new();
        context.record_error("one");
        context.extend_errors(vec!["two".to_string()]);
        assert_eq!(context.errors(), vec!["one", "two"]);

        context.flush_errors();
        assert_eq!(context.stats().last_error.as_deref(), Some("two"));

        context.clear_errors();
        assert!(context.errors().is_empty());
        assert_eq!(context.stats().last_error.as_deref(), Some("two"));
    }

    #[test]
    fn health_is_keyed_by_name() {
        let context = SyncContext::new();
        context.set_health("tables", SynchronizerHealth::Running);
        context.set_health("tables", SynchronizerHealth::Succeeded);
        context.set_health("views", SynchronizerHealth::Failed);

        let health = context.health();
        assert_eq!(health["tables"], SynchronizerHealth::Succeeded);
        assert_eq!(health["views"], SynchronizerHealth::Failed);
        assert_eq!(context.health_of("jobs"), None);
        assert_eq!(SynchronizerHealth::Failed.to_string(), "FAILED");
    }

    #[test]
    fn stats_update_in_place() {
        let context = SyncContext::new();
        context.update_stats(|s| s.passes_completed += 2);
        context.update_stats(|s| s.artifacts_cleaned += 1);
        let stats = context.stats();
        assert_eq!(stats.passes_completed, 2);
        assert_eq!(stats.artifacts_cleaned, 1);
    }
}
