//! A second pass requested while one is running.

use regsync_engine::{
    ArtifactService, ProcessorState, SkipReason, SyncResult, Synchronizer,
};
use regsync_testkit::prelude::*;
use std::fs::Metadata;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

/// Delegates to a scripted synchronizer but blocks inside `parse` until
/// released.
struct GateSynchronizer {
    inner: Arc<ScriptedSynchronizer>,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl Synchronizer for GateSynchronizer {
    fn artifact_type(&self) -> &str {
        self.inner.artifact_type()
    }

    fn accepts_file(&self, path: &Path, metadata: &Metadata) -> bool {
        self.inner.accepts_file(path, metadata)
    }

    fn parse(&self, location: &str, content: &[u8]) -> SyncResult<Vec<Artifact>> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner.parse(location, content)
    }

    fn retrieve(&self, location: &str) -> SyncResult<Vec<Artifact>> {
        self.inner.retrieve(location)
    }

    fn service(&self) -> &dyn ArtifactService {
        self.inner.service()
    }

    fn set_status(
        &self,
        artifact: &Artifact,
        lifecycle: ArtifactLifecycle,
        message: Option<&str>,
    ) -> SyncResult<()> {
        self.inner.set_status(artifact, lifecycle, message)
    }

    fn cleanup(&self, artifact: &Artifact) -> SyncResult<()> {
        self.inner.cleanup(artifact)
    }

    fn create(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.inner.create(artifact)
    }

    fn update(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.inner.update(artifact)
    }

    fn start(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.inner.start(artifact)
    }
}

#[test]
fn overlapping_pass_is_skipped_as_busy() {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let tables = ScriptedSynchronizer::new("table", "table");
    let gate = Arc::new(GateSynchronizer {
        inner: Arc::clone(&tables),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = TestEngine::new(vec![gate as Arc<dyn Synchronizer>]);
    engine.registry.write("/orders.table", "name = ORDERS");
    engine.watcher.mark_modified();

    thread::scope(|scope| {
        let running = scope.spawn(|| engine.processor.process());

        entered_rx.recv().unwrap();
        assert_eq!(engine.processor.state(), ProcessorState::Parsing);
        assert_eq!(
            engine.processor.try_process().skip_reason(),
            Some(SkipReason::Busy)
        );

        release_tx.send(()).unwrap();
        let outcome = running.join().unwrap();
        assert!(outcome.is_completed());
        assert_eq!(outcome.report().unwrap().parsed, 1);
    });

    assert_eq!(engine.processor.state(), ProcessorState::Idle);
    let stats = engine.processor.stats();
    assert_eq!(stats.passes_completed, 1);
    assert_eq!(stats.passes_skipped, 1);
    assert_eq!(
        tables
            .artifacts()
            .get(&tables.key("/orders.table", "ORDERS"))
            .unwrap()
            .lifecycle,
        ArtifactLifecycle::Started
    );
}

#[test]
fn blocking_process_waits_for_running_pass() {
    let (entered_tx, entered_rx) = channel();
    let (release_tx, release_rx) = channel();
    let gate = Arc::new(GateSynchronizer {
        inner: ScriptedSynchronizer::new("table", "table"),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = TestEngine::new(vec![gate as Arc<dyn Synchronizer>]);
    engine.registry.write("/orders.table", "name = ORDERS");
    engine.watcher.mark_modified();

    thread::scope(|scope| {
        let first = scope.spawn(|| engine.processor.process());
        entered_rx.recv().unwrap();

        engine.processor.force();
        let second = scope.spawn(|| engine.processor.process());
        release_tx.send(()).unwrap();

        assert!(first.join().unwrap().is_completed());
        // The forced second pass finds nothing new to parse.
        let second = second.join().unwrap();
        assert_eq!(second.report().unwrap().parsed, 0);
    });

    assert_eq!(engine.processor.stats().passes_completed, 2);
}
