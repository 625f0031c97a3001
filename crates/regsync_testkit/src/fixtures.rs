//! Test fixtures: a temporary registry and a wired-up engine.

use regsync_core::{DefinitionState, DefinitionStore, MemoryDefinitionStore};
use regsync_engine::{
    path_of, ChangeWatcher, EngineConfig, ManualWatcher, PassOutcome, PassReport, SyncProcessor,
    Synchronizer,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A registry directory that is removed when dropped.
pub struct TempRegistry {
    dir: TempDir,
}

impl TempRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The registry root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Resolves a registry location to a path.
    pub fn path(&self, location: &str) -> PathBuf {
        path_of(self.root(), location)
    }

    /// Writes a file at a location, creating parent directories.
    pub fn write(&self, location: &str, content: impl AsRef<[u8]>) {
        let path = self.path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create registry directory");
        }
        fs::write(path, content).expect("Failed to write registry file");
    }

    /// Removes the file at a location.
    pub fn remove(&self, location: &str) {
        fs::remove_file(self.path(location)).expect("Failed to remove registry file");
    }

    /// Returns true if a file exists at the location.
    pub fn contains(&self, location: &str) -> bool {
        self.path(location).is_file()
    }
}

impl Default for TempRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A processor wired to a temporary registry, an in-memory store and a
/// manual watcher.
pub struct TestEngine {
    /// The registry being reconciled.
    pub registry: TempRegistry,
    /// The definition store.
    pub store: Arc<MemoryDefinitionStore>,
    /// The change watcher; [`TestEngine::pass`] marks it modified.
    pub watcher: Arc<ManualWatcher>,
    /// The processor under test, already prepared.
    pub processor: SyncProcessor,
}

impl TestEngine {
    /// Creates a prepared engine with the default configuration.
    pub fn new(synchronizers: Vec<Arc<dyn Synchronizer>>) -> Self {
        Self::with_config(synchronizers, |config| config)
    }

    /// Creates a prepared engine, letting the caller adjust the
    /// configuration. The registry root is always the temporary registry.
    pub fn with_config(
        synchronizers: Vec<Arc<dyn Synchronizer>>,
        configure: impl FnOnce(EngineConfig) -> EngineConfig,
    ) -> Self {
        let registry = TempRegistry::new();
        let store = Arc::new(MemoryDefinitionStore::new());
        let watcher = Arc::new(ManualWatcher::new());
        let mut config = configure(EngineConfig::new(registry.root()));
        config.registry_root = registry.root().to_path_buf();

        let processor = SyncProcessor::new(
            config,
            Arc::clone(&store) as Arc<dyn DefinitionStore>,
            synchronizers,
            Arc::clone(&watcher) as Arc<dyn ChangeWatcher>,
        );
        processor.prepare().expect("Failed to prepare processor");

        Self {
            registry,
            store,
            watcher,
            processor,
        }
    }

    /// Signals a change and runs a pass that must complete.
    pub fn pass(&self) -> PassReport {
        self.watcher.mark_modified();
        match self.processor.process() {
            PassOutcome::Completed(report) => report,
            PassOutcome::Skipped(reason) => panic!("pass unexpectedly skipped: {reason:?}"),
        }
    }

    /// Returns the stored state of the definition at a location.
    pub fn definition_state(&self, location: &str) -> Option<DefinitionState> {
        self.store
            .find_by_key(location)
            .expect("Definition store failed")
            .map(|definition| definition.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_writes_nested_files() {
        let registry = TempRegistry::new();
        registry.write("/shop/nested/orders.table", "name = ORDERS");
        assert!(registry.contains("/shop/nested/orders.table"));

        registry.remove("/shop/nested/orders.table");
        assert!(!registry.contains("/shop/nested/orders.table"));
    }

    #[test]
    fn empty_engine_passes() {
        let engine = TestEngine::new(Vec::new());
        let report = engine.pass();
        assert!(report.is_clean());
        assert!(!report.phases_run);
    }
}
