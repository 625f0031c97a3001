//! A scripted synchronizer and an in-memory artifact service.
//!
//! Definition content for [`ScriptedSynchronizer`] is line based:
//!
//! ```text
//! # comment
//! name = ORDERS
//! depends = schema:/shop/shop.schema:SHOP
//! name = ORDER_ITEMS
//! depends = table:/shop/orders.table:ORDERS
//! ```
//!
//! Every `name` line starts a new artifact; `depends` lines add a
//! dependency key to the artifact above them. A file without `name` lines
//! yields one artifact named after the file stem.

use parking_lot::{Mutex, RwLock};
use regsync_core::{Artifact, ArtifactLifecycle, ArtifactPhase};
use regsync_engine::{ArtifactService, SyncError, SyncResult, Synchronizer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;

/// Artifacts kept in memory, keyed by artifact key.
#[derive(Debug, Default)]
pub struct MemoryArtifactService {
    artifacts: RwLock<BTreeMap<String, Artifact>>,
}

impl MemoryArtifactService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the artifact with a key.
    pub fn get(&self, key: &str) -> Option<Artifact> {
        self.artifacts.read().get(key).cloned()
    }

    /// Returns the artifacts parsed from a location.
    pub fn by_location(&self, location: &str) -> Vec<Artifact> {
        self.artifacts
            .read()
            .values()
            .filter(|artifact| artifact.location == location)
            .cloned()
            .collect()
    }

    /// Inserts or replaces an artifact.
    pub fn insert(&self, artifact: Artifact) {
        self.artifacts.write().insert(artifact.key.clone(), artifact);
    }

    /// Removes an artifact.
    pub fn remove(&self, key: &str) -> Option<Artifact> {
        self.artifacts.write().remove(key)
    }

    /// Number of registered artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.artifacts.read().is_empty()
    }
}

impl ArtifactService for MemoryArtifactService {
    fn get_all(&self) -> SyncResult<Vec<Artifact>> {
        Ok(self.artifacts.read().values().cloned().collect())
    }

    fn save(&self, artifact: &Artifact) -> SyncResult<()> {
        self.insert(artifact.clone());
        Ok(())
    }
}

/// An operation a synchronizer was asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// `parse` of a definition.
    Parse,
    /// `retrieve` of a location.
    Retrieve,
    /// A phase handler.
    Phase(ArtifactPhase),
    /// `set_status`.
    SetStatus,
    /// `cleanup`.
    Cleanup,
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Name of the synchronizer that was called.
    pub synchronizer: String,
    /// What was called.
    pub operation: Operation,
    /// Artifact key, or the location for parse and retrieve.
    pub target: String,
}

/// A call log that can be shared between synchronizers to observe the
/// global call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Targets of every call of an operation, in call order.
    pub fn targets(&self, operation: Operation) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .map(|call| call.target.clone())
            .collect()
    }

    /// Keys passed to a phase handler, in call order.
    pub fn phase_keys(&self, phase: ArtifactPhase) -> Vec<String> {
        self.targets(Operation::Phase(phase))
    }

    /// Index of the first call of `operation` on `target`.
    pub fn position(&self, operation: Operation, target: &str) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|call| call.operation == operation && call.target == target)
    }

    fn record(&self, synchronizer: &str, operation: Operation, target: &str) {
        self.calls.lock().push(Call {
            synchronizer: synchronizer.to_string(),
            operation,
            target: target.to_string(),
        });
    }
}

/// How an injected fault behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an error.
    Error,
    /// Panic.
    Panic,
}

#[derive(Debug, Default)]
struct Faults {
    parse: HashSet<String>,
    phases: HashMap<(String, ArtifactPhase), Fault>,
    cleanup: HashSet<String>,
    set_status: HashSet<String>,
}

/// A synchronizer for one artifact type claimed by file extension.
///
/// Handlers move artifacts forward: `create` turns `New` into `Created`,
/// `update` turns `Modified` into `Updated`, and `start` marks created or
/// updated artifacts as running. Parsed artifacts are registered in the
/// backing [`MemoryArtifactService`] right away.
#[derive(Debug)]
pub struct ScriptedSynchronizer {
    name: String,
    artifact_type: String,
    extension: String,
    service: MemoryArtifactService,
    log: CallLog,
    faults: Mutex<Faults>,
}

impl ScriptedSynchronizer {
    /// Creates a synchronizer for `artifact_type` claiming files with
    /// `extension`, with its own call log.
    pub fn new(artifact_type: &str, extension: &str) -> Arc<Self> {
        Self::with_log(artifact_type, extension, CallLog::new())
    }

    /// Creates a synchronizer recording into a shared call log.
    pub fn with_log(artifact_type: &str, extension: &str, log: CallLog) -> Arc<Self> {
        Self::named(&format!("{artifact_type}-synchronizer"), artifact_type, extension, log)
    }

    /// Creates a synchronizer with an explicit name.
    pub fn named(name: &str, artifact_type: &str, extension: &str, log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            artifact_type: artifact_type.to_string(),
            extension: extension.to_string(),
            service: MemoryArtifactService::new(),
            log,
            faults: Mutex::new(Faults::default()),
        })
    }

    /// Returns this synchronizer as a registrable handle.
    pub fn shared(self: &Arc<Self>) -> Arc<dyn Synchronizer> {
        Arc::clone(self) as Arc<dyn Synchronizer>
    }

    /// The call log.
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// The backing artifact service.
    pub fn artifacts(&self) -> &MemoryArtifactService {
        &self.service
    }

    /// Makes parsing the definition at `location` fail.
    pub fn fail_parse(&self, location: &str) {
        self.faults.lock().parse.insert(location.to_string());
    }

    /// Makes a phase handler fail for an artifact key.
    pub fn fail_phase(&self, key: &str, phase: ArtifactPhase) {
        self.inject(key, phase, Fault::Error);
    }

    /// Makes a phase handler panic for an artifact key.
    pub fn panic_in_phase(&self, key: &str, phase: ArtifactPhase) {
        self.inject(key, phase, Fault::Panic);
    }

    /// Makes cleanup fail for an artifact key.
    pub fn fail_cleanup(&self, key: &str) {
        self.faults.lock().cleanup.insert(key.to_string());
    }

    /// Makes `set_status` panic for an artifact key.
    pub fn panic_in_set_status(&self, key: &str) {
        self.faults.lock().set_status.insert(key.to_string());
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// The key this synchronizer gives an artifact.
    pub fn key(&self, location: &str, name: &str) -> String {
        Artifact::key_for(&self.artifact_type, location, name)
    }

    fn inject(&self, key: &str, phase: ArtifactPhase, fault: Fault) {
        self.faults
            .lock()
            .phases
            .insert((key.to_string(), phase), fault);
    }

    fn run_phase(
        &self,
        artifact: &mut Artifact,
        phase: ArtifactPhase,
        apply: impl FnOnce(&mut Artifact),
    ) -> SyncResult<()> {
        self.log.record(&self.name, Operation::Phase(phase), &artifact.key);
        let fault = self
            .faults
            .lock()
            .phases
            .get(&(artifact.key.clone(), phase))
            .copied();
        match fault {
            Some(Fault::Error) => Err(SyncError::phase(
                &artifact.key,
                phase,
                "injected failure",
            )),
            Some(Fault::Panic) => panic!("injected panic for {} in {phase}", artifact.key),
            None => {
                apply(artifact);
                Ok(())
            }
        }
    }

    fn parse_lines(&self, location: &str, content: &[u8]) -> SyncResult<Vec<Artifact>> {
        let text = std::str::from_utf8(content)
            .map_err(|e| SyncError::parse(location, format!("content is not UTF-8: {e}")))?;

        let mut artifacts: Vec<Artifact> = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((field, value)) = line.split_once('=') else {
                return Err(SyncError::parse(
                    location,
                    format!("line {}: expected `field = value`", number + 1),
                ));
            };
            let value = value.trim();
            match field.trim() {
                "name" => artifacts.push(Artifact::new(&self.artifact_type, location, value)),
                "depends" => match artifacts.last_mut() {
                    Some(artifact) => artifact.dependencies.push(value.to_string()),
                    None => {
                        return Err(SyncError::parse(
                            location,
                            format!("line {}: `depends` before any `name`", number + 1),
                        ))
                    }
                },
                other => {
                    return Err(SyncError::parse(
                        location,
                        format!("line {}: unknown field `{other}`", number + 1),
                    ))
                }
            }
        }

        if artifacts.is_empty() {
            let stem = Path::new(location)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            artifacts.push(Artifact::new(&self.artifact_type, location, stem));
        }
        Ok(artifacts)
    }
}

impl Synchronizer for ScriptedSynchronizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    fn accepts_file(&self, path: &Path, _metadata: &Metadata) -> bool {
        path.extension()
            .is_some_and(|extension| extension == self.extension.as_str())
    }

    fn parse(&self, location: &str, content: &[u8]) -> SyncResult<Vec<Artifact>> {
        self.log.record(&self.name, Operation::Parse, location);
        if self.faults.lock().parse.contains(location) {
            return Err(SyncError::parse(location, "injected parse failure"));
        }

        let artifacts = self.parse_lines(location, content)?;
        let keys: HashSet<&str> = artifacts.iter().map(|a| a.key.as_str()).collect();
        for stale in self.service.by_location(location) {
            if !keys.contains(stale.key.as_str()) {
                self.service.remove(&stale.key);
            }
        }
        for artifact in &artifacts {
            self.service.insert(artifact.clone());
        }
        Ok(artifacts)
    }

    fn retrieve(&self, location: &str) -> SyncResult<Vec<Artifact>> {
        self.log.record(&self.name, Operation::Retrieve, location);
        Ok(self.service.by_location(location))
    }

    fn service(&self) -> &dyn ArtifactService {
        &self.service
    }

    fn set_status(
        &self,
        artifact: &Artifact,
        lifecycle: ArtifactLifecycle,
        message: Option<&str>,
    ) -> SyncResult<()> {
        self.log.record(&self.name, Operation::SetStatus, &artifact.key);
        let panics = self.faults.lock().set_status.contains(&artifact.key);
        if panics {
            panic!("injected panic for {} in set_status", artifact.key);
        }
        let mut stored = artifact.clone();
        stored.lifecycle = lifecycle;
        stored.message = message.map(str::to_string);
        self.service.insert(stored);
        Ok(())
    }

    fn cleanup(&self, artifact: &Artifact) -> SyncResult<()> {
        self.log.record(&self.name, Operation::Cleanup, &artifact.key);
        if self.faults.lock().cleanup.contains(&artifact.key) {
            return Err(SyncError::cleanup(&artifact.key, "injected cleanup failure"));
        }
        self.service.remove(&artifact.key);
        Ok(())
    }

    fn prepare(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.run_phase(artifact, ArtifactPhase::Prepare, |_| {})
    }

    fn create(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.run_phase(artifact, ArtifactPhase::Create, |artifact| {
            if artifact.lifecycle == ArtifactLifecycle::New {
                artifact.lifecycle = ArtifactLifecycle::Created;
            }
        })
    }

    fn update(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.run_phase(artifact, ArtifactPhase::Update, |artifact| {
            if artifact.lifecycle == ArtifactLifecycle::Modified {
                artifact.lifecycle = ArtifactLifecycle::Updated;
            }
        })
    }

    fn start(&self, artifact: &mut Artifact) -> SyncResult<()> {
        self.run_phase(artifact, ArtifactPhase::Start, |artifact| {
            if matches!(
                artifact.lifecycle,
                ArtifactLifecycle::Created | ArtifactLifecycle::Updated
            ) {
                artifact.lifecycle = ArtifactLifecycle::Started;
                artifact.running = true;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_dependencies() {
        let sync = ScriptedSynchronizer::new("view", "view");
        let artifacts = sync
            .parse(
                "/shop/report.view",
                b"# views\nname = DAILY\ndepends = table:/shop/orders.table:ORDERS\nname = WEEKLY\n",
            )
            .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].key, "view:/shop/report.view:DAILY");
        assert_eq!(artifacts[0].dependencies, vec!["table:/shop/orders.table:ORDERS"]);
        assert!(artifacts[1].dependencies.is_empty());
        assert_eq!(sync.artifacts().len(), 2);
    }

    #[test]
    fn empty_content_uses_file_stem() {
        let sync = ScriptedSynchronizer::new("table", "table");
        let artifacts = sync.parse("/shop/orders.table", b"").unwrap();
        assert_eq!(artifacts[0].name, "orders");
    }

    #[test]
    fn reparse_drops_stale_artifacts() {
        let sync = ScriptedSynchronizer::new("table", "table");
        sync.parse("/t.table", b"name = A\nname = B").unwrap();
        sync.parse("/t.table", b"name = A").unwrap();
        assert_eq!(sync.artifacts().len(), 1);
        assert!(sync.artifacts().get(&sync.key("/t.table", "A")).is_some());
    }

    #[test]
    fn malformed_content_is_a_parse_error() {
        let sync = ScriptedSynchronizer::new("table", "table");
        assert!(sync.parse("/t.table", b"depends = x").is_err());
        assert!(sync.parse("/t.table", b"colour = red").is_err());
        assert!(sync.parse("/t.table", b"garbage").is_err());
    }

    #[test]
    fn handlers_advance_lifecycle_and_log() {
        let sync = ScriptedSynchronizer::new("table", "table");
        let mut artifact = Artifact::new("table", "/t.table", "T");

        sync.create(&mut artifact).unwrap();
        assert_eq!(artifact.lifecycle, ArtifactLifecycle::Created);
        sync.start(&mut artifact).unwrap();
        assert!(artifact.running);
        assert_eq!(artifact.lifecycle, ArtifactLifecycle::Started);

        assert_eq!(
            sync.log().targets(Operation::Phase(ArtifactPhase::Create)),
            vec![artifact.key.clone()]
        );
    }

    #[test]
    fn injected_phase_error() {
        let sync = ScriptedSynchronizer::new("table", "table");
        let mut artifact = Artifact::new("table", "/t.table", "T");
        sync.fail_phase(&artifact.key, ArtifactPhase::Create);

        assert!(sync.create(&mut artifact).is_err());
        sync.clear_faults();
        assert!(sync.create(&mut artifact).is_ok());
    }

    #[test]
    fn shared_log_orders_calls_across_synchronizers() {
        let log = CallLog::new();
        let tables = ScriptedSynchronizer::with_log("table", "table", log.clone());
        let views = ScriptedSynchronizer::named("views", "view", "view", log.clone());

        views.retrieve("/v.view").unwrap();
        tables.retrieve("/t.table").unwrap();

        let calls = log.calls();
        assert_eq!(calls[0].synchronizer, "views");
        assert_eq!(calls[1].synchronizer, "table-synchronizer");
        assert_eq!(log.position(Operation::Retrieve, "/t.table"), Some(1));
    }
}
