//! Definition state survives a restart of the processor.

use regsync_core::{DefinitionStore, FileDefinitionStore, StoreConfig};
use regsync_engine::{EngineConfig, ManualWatcher, SyncProcessor, Synchronizer};
use regsync_testkit::prelude::*;
use std::path::Path;
use std::sync::Arc;

fn processor(
    registry: &TempRegistry,
    store: &Path,
    synchronizers: Vec<Arc<dyn Synchronizer>>,
) -> (SyncProcessor, Arc<FileDefinitionStore>) {
    let store = Arc::new(
        FileDefinitionStore::open(store, StoreConfig::new().sync_on_save(false)).unwrap(),
    );
    let processor = SyncProcessor::new(
        EngineConfig::new(registry.root()),
        Arc::clone(&store) as Arc<dyn DefinitionStore>,
        synchronizers,
        Arc::new(ManualWatcher::new()),
    );
    (processor, store)
}

#[test]
fn restart_resumes_from_stored_definitions() {
    let registry = TempRegistry::new();
    let store_dir = tempfile::tempdir().unwrap();
    let tables = ScriptedSynchronizer::new("table", "table");
    let key = tables.key("/orders.table", "ORDERS");
    registry.write("/orders.table", "name = ORDERS");

    {
        let (processor, store) = processor(&registry, store_dir.path(), vec![tables.shared()]);
        processor.prepare().unwrap();
        let outcome = processor.process();
        assert_eq!(outcome.report().unwrap().parsed, 1);
        assert_eq!(store.len(), 1);
        assert!(tables.artifacts().get(&key).unwrap().running);
    }

    let (processor, store) = processor(&registry, store_dir.path(), vec![tables.shared()]);
    assert_eq!(
        store.find_by_key("/orders.table").unwrap().unwrap().state,
        DefinitionState::Parsed
    );

    processor.prepare().unwrap();
    assert!(!tables.artifacts().get(&key).unwrap().running);

    tables.log().clear();
    let outcome = processor.process();
    let report = outcome.report().unwrap();
    assert_eq!(report.parsed, 0);
    assert!(!report.phases_run);
    assert!(tables.log().targets(Operation::Parse).is_empty());
    assert_eq!(
        tables.log().targets(Operation::Retrieve),
        vec!["/orders.table".to_string()]
    );
}

#[test]
fn edits_made_while_stopped_are_picked_up() {
    let registry = TempRegistry::new();
    let store_dir = tempfile::tempdir().unwrap();
    let tables = ScriptedSynchronizer::new("table", "table");
    registry.write("/orders.table", "name = ORDERS");
    registry.write("/legacy.table", "name = LEGACY");

    {
        let (processor, _store) = processor(&registry, store_dir.path(), vec![tables.shared()]);
        processor.prepare().unwrap();
        processor.process();
    }

    registry.write("/orders.table", "name = ORDERS\nname = ORDER_ITEMS");
    registry.remove("/legacy.table");

    let (processor, store) = processor(&registry, store_dir.path(), vec![tables.shared()]);
    processor.prepare().unwrap();
    let outcome = processor.process();
    let report = outcome.report().unwrap();

    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.parsed, 1);
    assert_eq!(report.cleaned, 1);
    assert_eq!(
        store.find_by_key("/legacy.table").unwrap().unwrap().state,
        DefinitionState::Deleted
    );
    let items = tables
        .artifacts()
        .get(&tables.key("/orders.table", "ORDER_ITEMS"))
        .unwrap();
    assert_eq!(items.lifecycle, ArtifactLifecycle::Started);
}

#[test]
fn second_open_of_a_live_store_is_refused() {
    let store_dir = tempfile::tempdir().unwrap();
    let _first = FileDefinitionStore::open(store_dir.path(), StoreConfig::new()).unwrap();
    assert!(FileDefinitionStore::open(store_dir.path(), StoreConfig::new()).is_err());
}
