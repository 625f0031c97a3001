//! Definition store contract and implementations.
//!
//! The store persists one record per registry file. The engine only needs
//! lookup by key, save, and listing; removal is exposed for maintenance
//! tooling and is never called during a pass.
//!
//! # Implementors
//!
//! - [`MemoryDefinitionStore`] - For testing and embedding
//! - [`FileDefinitionStore`] - Durable, single-writer directory store

#[cfg(feature = "std")]
mod file;
mod memory;

#[cfg(feature = "std")]
pub use file::FileDefinitionStore;
pub use memory::MemoryDefinitionStore;

use crate::definition::Definition;
use crate::error::CoreResult;

/// Persistence for definition records.
///
/// Stores are shared between the processor and status readers, so every
/// operation takes `&self` and implementations synchronize internally.
///
/// # Invariants
///
/// - `find_by_key` returns the record last passed to `save` for that key
/// - `save` persists before returning; content bytes are never persisted
/// - `all` returns records ordered by key
pub trait DefinitionStore: Send + Sync {
    /// Looks up a definition by its key (the location).
    fn find_by_key(&self, key: &str) -> CoreResult<Option<Definition>>;

    /// Looks up a definition by location.
    fn find_by_location(&self, location: &str) -> CoreResult<Option<Definition>> {
        self.find_by_key(location)
    }

    /// Inserts or replaces a definition.
    fn save(&self, definition: &Definition) -> CoreResult<()>;

    /// Removes a definition. Returns true if it existed.
    fn delete(&self, key: &str) -> CoreResult<bool>;

    /// Returns all definitions ordered by key.
    fn all(&self) -> CoreResult<Vec<Definition>>;
}

/// Strips in-memory content before a record is stored.
pub(crate) fn detached(definition: &Definition) -> Definition {
    Definition {
        content: None,
        ..definition.clone()
    }
}
