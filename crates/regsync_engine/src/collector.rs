//! Change detection: reconciles registry files against the definition store.

use crate::synchronizer::Synchronizer;
use regsync_core::{checksum, Definition, DefinitionState, DefinitionStore};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Per-synchronizer queue of definitions to process in this pass, ordered
/// by key.
pub type DefinitionQueue = BTreeMap<String, Definition>;

/// What the collector decided for one registry file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collected {
    /// First sighting; stored as `New` and queued.
    New,
    /// Checksum changed; stored as `Modified` and queued.
    Modified,
    /// Unchanged but pending from an earlier pass; queued.
    Pending,
    /// Unchanged and already queued in this pass.
    AlreadyQueued,
    /// Unchanged and broken; skipped until the content changes.
    Broken,
    /// Unchanged and deleted; skipped.
    Deleted,
    /// The file could not be read or the store failed.
    Failed,
}

impl Collected {
    /// Returns true if the file ended up in a queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Collected::New | Collected::Modified | Collected::Pending)
    }
}

impl fmt::Display for Collected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Collected::New => "new",
            Collected::Modified => "modified",
            Collected::Pending => "pending",
            Collected::AlreadyQueued => "queued",
            Collected::Broken => "broken",
            Collected::Deleted => "deleted",
            Collected::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Returns the index of the first synchronizer that accepts the file.
///
/// Registration order decides; a file is never claimed twice.
pub fn claim(
    synchronizers: &[Arc<dyn Synchronizer>],
    path: &Path,
    metadata: &Metadata,
) -> Option<usize> {
    synchronizers
        .iter()
        .position(|s| s.accepts_file(path, metadata))
}

/// Builds the per-synchronizer definition queues for one pass.
///
/// Store writes happen immediately so that a definition's state is
/// persisted even if the pass does not complete. In dry-run mode the store
/// is only read.
pub struct DefinitionCollector<'a> {
    store: &'a dyn DefinitionStore,
    queues: Vec<DefinitionQueue>,
    errors: Vec<String>,
    dry_run: bool,
}

impl<'a> DefinitionCollector<'a> {
    /// Creates a collector with one queue per synchronizer.
    pub fn new(store: &'a dyn DefinitionStore, queue_count: usize) -> Self {
        Self {
            store,
            queues: vec![DefinitionQueue::new(); queue_count],
            errors: Vec::new(),
            dry_run: false,
        }
    }

    /// Disables store writes.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Reads a claimed file and reconciles it.
    ///
    /// A read failure is logged and recorded; it never stops the caller.
    pub fn collect_file(&mut self, queue: usize, path: &Path, location: &str) -> Collected {
        match std::fs::read(path) {
            Ok(content) => self.reconcile(queue, location, content),
            Err(e) => {
                let message = format!("Failed to read {location}: {e}");
                error!(location = %location, error = %e, "failed to read registry file");
                self.errors.push(message);
                Collected::Failed
            }
        }
    }

    /// Reconciles freshly loaded content against the stored definition.
    pub fn reconcile(&mut self, queue: usize, location: &str, content: Vec<u8>) -> Collected {
        let existing = match self.store.find_by_key(location) {
            Ok(existing) => existing,
            Err(e) => {
                self.record_store_error(location, &e);
                return Collected::Failed;
            }
        };

        let Some(mut existing) = existing else {
            let definition = Definition::new(location, content);
            if !self.persist(&definition) {
                return Collected::Failed;
            }
            debug!(location = %location, "new definition");
            self.enqueue(queue, definition);
            return Collected::New;
        };

        if existing.checksum != checksum(&content) {
            existing.replace_content(content);
            existing.set_state(DefinitionState::Modified, None);
            if !self.persist(&existing) {
                return Collected::Failed;
            }
            debug!(location = %location, "modified definition");
            self.enqueue(queue, existing);
            return Collected::Modified;
        }

        let state = existing.state;
        match state {
            state if state.is_pending() => {
                if self.queues[queue].contains_key(location) {
                    return Collected::AlreadyQueued;
                }
                existing.content = Some(content);
                self.enqueue(queue, existing);
                Collected::Pending
            }
            DefinitionState::Broken => {
                warn!(
                    location = %location,
                    reason = existing.message.as_deref().unwrap_or(""),
                    "definition is broken; skipped until its content changes"
                );
                Collected::Broken
            }
            _ => Collected::Deleted,
        }
    }

    /// Returns the queue for a synchronizer index.
    #[must_use]
    pub fn queue(&self, index: usize) -> &DefinitionQueue {
        &self.queues[index]
    }

    /// Returns the errors recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Consumes the collector, returning the queues and recorded errors.
    #[must_use]
    pub fn finish(self) -> (Vec<DefinitionQueue>, Vec<String>) {
        (self.queues, self.errors)
    }

    fn enqueue(&mut self, queue: usize, definition: Definition) {
        self.queues[queue].insert(definition.key().to_string(), definition);
    }

    fn persist(&mut self, definition: &Definition) -> bool {
        if self.dry_run {
            return true;
        }
        match self.store.save(definition) {
            Ok(()) => true,
            Err(e) => {
                self.record_store_error(definition.key(), &e);
                false
            }
        }
    }

    fn record_store_error(&mut self, location: &str, error: &regsync_core::CoreError) {
        error!(location = %location, error = %error, "definition store failed");
        self.errors
            .push(format!("Definition store failed for {location}: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsync_core::MemoryDefinitionStore;

    #[test]
    fn first_sighting_is_new_and_persisted() {
        let store = MemoryDefinitionStore::new();
        let mut collector = DefinitionCollector::new(&store, 1);

        assert_eq!(collector.reconcile(0, "/a.table", b"a".to_vec()), Collected::New);

        let stored = store.find_by_key("/a.table").unwrap().unwrap();
        assert_eq!(stored.state, DefinitionState::New);
        assert!(collector.queue(0).contains_key("/a.table"));
        assert_eq!(
            collector.queue(0)["/a.table"].content.as_deref(),
            Some(&b"a"[..])
        );
    }

    #[test]
    fn changed_checksum_is_modified() {
        let store = MemoryDefinitionStore::new();
        let mut def = Definition::new("/a.table", b"old".to_vec());
        def.set_state(DefinitionState::Parsed, None);
        store.save(&def).unwrap();

        let mut collector = DefinitionCollector::new(&store, 1);
        assert_eq!(collector.reconcile(0, "/a.table", b"new".to_vec()), Collected::Modified);

        let stored = store.find_by_key("/a.table").unwrap().unwrap();
        assert_eq!(stored.state, DefinitionState::Modified);
        assert_eq!(stored.checksum, checksum(b"new"));
    }

    #[test]
    fn unchanged_parsed_is_pending_once() {
        let store = MemoryDefinitionStore::new();
        let mut def = Definition::new("/a.table", b"a".to_vec());
        def.set_state(DefinitionState::Parsed, None);
        store.save(&def).unwrap();
        let saves = store.save_count();

        let mut collector = DefinitionCollector::new(&store, 1);
        assert_eq!(collector.reconcile(0, "/a.table", b"a".to_vec()), Collected::Pending);
        assert_eq!(
            collector.reconcile(0, "/a.table", b"a".to_vec()),
            Collected::AlreadyQueued
        );

        assert_eq!(store.save_count(), saves);
        assert_eq!(
            store.find_by_key("/a.table").unwrap().unwrap().state,
            DefinitionState::Parsed
        );
    }

    #[test]
    fn unchanged_broken_and_deleted_are_skipped() {
        let store = MemoryDefinitionStore::new();
        let mut broken = Definition::new("/b.table", b"b".to_vec());
        broken.set_state(DefinitionState::Broken, Some("bad".into()));
        store.save(&broken).unwrap();
        let mut deleted = Definition::new("/d.table", b"d".to_vec());
        deleted.set_state(DefinitionState::Deleted, None);
        store.save(&deleted).unwrap();

        let mut collector = DefinitionCollector::new(&store, 1);
        assert_eq!(collector.reconcile(0, "/b.table", b"b".to_vec()), Collected::Broken);
        assert_eq!(collector.reconcile(0, "/d.table", b"d".to_vec()), Collected::Deleted);
        assert!(collector.queue(0).is_empty());
    }

    #[test]
    fn broken_with_new_content_is_retried() {
        let store = MemoryDefinitionStore::new();
        let mut broken = Definition::new("/b.table", b"b".to_vec());
        broken.set_state(DefinitionState::Broken, Some("bad".into()));
        store.save(&broken).unwrap();

        let mut collector = DefinitionCollector::new(&store, 1);
        assert_eq!(collector.reconcile(0, "/b.table", b"fixed".to_vec()), Collected::Modified);

        let stored = store.find_by_key("/b.table").unwrap().unwrap();
        assert_eq!(stored.state, DefinitionState::Modified);
        assert!(stored.message.is_none());
    }

    #[test]
    fn dry_run_does_not_write() {
        let store = MemoryDefinitionStore::new();
        let mut collector = DefinitionCollector::new(&store, 1).dry_run();

        assert_eq!(collector.reconcile(0, "/a.table", b"a".to_vec()), Collected::New);
        assert!(store.is_empty());
        assert!(collector.queue(0).contains_key("/a.table"));
    }

    #[test]
    fn unreadable_file_is_recorded() {
        let store = MemoryDefinitionStore::new();
        let mut collector = DefinitionCollector::new(&store, 1);

        let outcome = collector.collect_file(0, Path::new("/definitely/not/here.table"), "/here.table");
        assert_eq!(outcome, Collected::Failed);
        assert_eq!(collector.errors().len(), 1);
        assert!(collector.errors()[0].contains("/here.table"));

        let (queues, errors) = collector.finish();
        assert!(queues[0].is_empty());
        assert_eq!(errors.len(), 1);
    }
}
