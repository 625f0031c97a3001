//! Purge command implementation.

use regsync_core::{DefinitionState, DefinitionStore};
use regsync_engine::path_of;
use std::path::Path;
use tracing::info;

/// Runs the purge command.
pub fn run(
    path: &Path,
    registry: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(path)?;
    let purged = purge(&store, registry, dry_run)?;

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for location in &purged {
        println!("  {location}");
    }
    println!("{verb} {} definition(s)", purged.len());
    Ok(())
}

/// Removes `DELETED` definitions and, when a registry is given, those
/// whose file no longer exists in it. Returns the affected locations in
/// order.
pub fn purge(
    store: &dyn DefinitionStore,
    registry: Option<&Path>,
    dry_run: bool,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut stale: Vec<String> = store
        .all()?
        .into_iter()
        .filter(|definition| {
            definition.state == DefinitionState::Deleted
                || registry.is_some_and(|root| !path_of(root, &definition.location).exists())
        })
        .map(|definition| definition.location)
        .collect();
    stale.sort();

    if !dry_run {
        for location in &stale {
            store.delete(location)?;
            info!(location = %location, "definition purged");
        }
    }
    Ok(stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use regsync_core::{Definition, MemoryDefinitionStore};
    use std::fs;

    fn store() -> MemoryDefinitionStore {
        let store = MemoryDefinitionStore::new();
        let mut deleted = Definition::new("/gone.table", b"g".to_vec());
        deleted.set_state(DefinitionState::Deleted, None);
        let mut parsed = Definition::new("/kept.table", b"k".to_vec());
        parsed.set_state(DefinitionState::Parsed, None);
        let orphan = Definition::new("/orphan.table", b"o".to_vec());
        for definition in [deleted, parsed, orphan] {
            store.save(&definition).unwrap();
        }
        store
    }

    #[test]
    fn removes_deleted_definitions() {
        let store = store();
        let purged = purge(&store, None, false).unwrap();
        assert_eq!(purged, vec!["/gone.table".to_string()]);
        assert!(store.find_by_key("/gone.table").unwrap().is_none());
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn registry_check_removes_orphans() {
        let registry = tempfile::tempdir().unwrap();
        fs::write(registry.path().join("kept.table"), "k").unwrap();

        let store = store();
        let purged = purge(&store, Some(registry.path()), false).unwrap();
        assert_eq!(purged, vec!["/gone.table".to_string(), "/orphan.table".to_string()]);
        assert!(store.find_by_key("/kept.table").unwrap().is_some());
    }

    #[test]
    fn dry_run_leaves_store_untouched() {
        let store = store();
        let purged = purge(&store, None, true).unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(store.all().unwrap().len(), 3);
    }
}
