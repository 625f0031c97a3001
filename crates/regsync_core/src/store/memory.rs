//! In-memory definition store.

use super::{detached, DefinitionStore};
use crate::definition::Definition;
use crate::error::CoreResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory definition store.
///
/// Records live for the lifetime of the store. The number of saves is
/// tracked so tests can assert that state changes were persisted.
#[derive(Debug, Default)]
pub struct MemoryDefinitionStore {
    records: RwLock<BTreeMap<String, Definition>>,
    saves: AtomicU64,
}

impl MemoryDefinitionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of `save` calls so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns the number of stored definitions.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the store holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl DefinitionStore for MemoryDefinitionStore {
    fn find_by_key(&self, key: &str) -> CoreResult<Option<Definition>> {
        Ok(self.records.read().get(key).cloned())
    }

    fn save(&self, definition: &Definition) -> CoreResult<()> {
        self.records
            .write()
            .insert(definition.key().to_string(), detached(definition));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, key: &str) -> CoreResult<bool> {
        Ok(self.records.write().remove(key).is_some())
    }

    fn all(&self) -> CoreResult<Vec<Definition>> {
        Ok(self.records.read().values().cloned().collect())
    }
}
