//! Registry change notification.
//!
//! The processor asks its watcher whether anything under the registry
//! changed since the last pass and skips the pass when nothing did. The
//! flag is cleared at the start of every pass that runs, so events arriving
//! during a pass trigger the next one.

use crate::error::SyncResult;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of "something changed" signals for the registry.
pub trait ChangeWatcher: Send + Sync {
    /// Starts watching the registry root.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying watch cannot be registered.
    fn initialize(&self, root: &Path) -> SyncResult<()>;

    /// Returns true if a change was observed since the last reset.
    fn is_modified(&self) -> bool;

    /// Clears the modification flag.
    fn reset(&self);
}

/// Watches the registry through the operating system's file events.
#[derive(Default)]
pub struct NotifyWatcher {
    modified: Arc<AtomicBool>,
    inner: Mutex<Option<RecommendedWatcher>>,
}

impl NotifyWatcher {
    /// Creates a watcher; nothing is watched until [`ChangeWatcher::initialize`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a watch has been registered.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl ChangeWatcher for NotifyWatcher {
    fn initialize(&self, root: &Path) -> SyncResult<()> {
        let flag = Arc::clone(&self.modified);
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "registry changed");
                    flag.store(true, Ordering::SeqCst);
                }
                Err(e) => {
                    // Lost events are treated as a change.
                    warn!(error = %e, "registry watch error");
                    flag.store(true, Ordering::SeqCst);
                }
            },
            Config::default(),
        )?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        *self.inner.lock() = Some(watcher);
        debug!(root = %root.display(), "registry watch registered");
        Ok(())
    }

    fn is_modified(&self) -> bool {
        self.modified.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.modified.store(false, Ordering::SeqCst);
    }
}

/// A watcher driven by explicit calls, for embedders that learn about
/// changes some other way.
#[derive(Debug, Default)]
pub struct ManualWatcher {
    modified: AtomicBool,
}

impl ManualWatcher {
    /// Creates a watcher with the flag cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change.
    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::SeqCst);
    }
}

impl ChangeWatcher for ManualWatcher {
    fn initialize(&self, _root: &Path) -> SyncResult<()> {
        Ok(())
    }

    fn is_modified(&self) -> bool {
        self.modified.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.modified.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[test]
    fn manual_watcher_flag() {
        let watcher = ManualWatcher::new();
        assert!(!watcher.is_modified());
        watcher.mark_modified();
        assert!(watcher.is_modified());
        watcher.reset();
        assert!(!watcher.is_modified());
    }

    #[test]
    fn notify_watcher_sees_new_file() {
        let temp = tempdir().unwrap();
        let watcher = NotifyWatcher::new();
        watcher.initialize(temp.path()).unwrap();
        assert!(watcher.is_watching());

        std::fs::write(temp.path().join("a.table"), "a").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !watcher.is_modified() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(watcher.is_modified());

        watcher.reset();
        assert!(!watcher.is_modified());
    }

    #[test]
    fn missing_root_fails_to_initialize() {
        let temp = tempdir().unwrap();
        let watcher = NotifyWatcher::new();
        assert!(watcher.initialize(&temp.path().join("missing")).is_err());
        assert!(!watcher.is_watching());
    }
}
