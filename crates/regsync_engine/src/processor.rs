//! The synchronization processor: one reconciliation pass at a time.
//!
//! A pass walks the registry, reconciles files against the definition
//! store, parses changed definitions into artifacts, orders those artifacts
//! by dependency and drives them through the four lifecycle phases. It ends
//! by cleaning up artifacts whose source file disappeared.
//!
//! ```text
//! Idle → Collecting → Parsing → [Sorting → Depleting(P) ×4] → CleaningUp → Idle
//! ```
//!
//! Nothing that goes wrong with a single file, definition or artifact aborts
//! a pass; such problems end up in [`SyncProcessor::errors`]. Only the
//! guards described on [`SkipReason`] prevent a pass from running.

use crate::collector::{claim, DefinitionCollector, DefinitionQueue};
use crate::config::{CleanupPolicy, EngineConfig};
use crate::context::{PassReport, SyncContext, SyncStats, SynchronizerHealth};
use crate::error::{SyncError, SyncResult};
use crate::synchronizer::Synchronizer;
use crate::topology::{
    PhaseLedger, TopologicalDepleter, TopologicalSorter, TopologyNode, TopologyWrapper,
};
use crate::walker::{path_of, RegistryWalker};
use crate::watcher::ChangeWatcher;
use parking_lot::{Mutex, MutexGuard, RwLock};
use regsync_core::{Artifact, ArtifactLifecycle, ArtifactPhase, DefinitionState, DefinitionStore};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, trace, warn};
use uuid::Uuid;

/// What the processor is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// No pass is running.
    Idle,
    /// The one-time preparation step is running.
    Preparing,
    /// Walking the registry and reconciling definitions.
    Collecting,
    /// Parsing definitions into artifacts.
    Parsing,
    /// Ordering artifacts by dependency.
    Sorting,
    /// Driving artifacts through a phase.
    Depleting(ArtifactPhase),
    /// Removing artifacts whose source file is gone.
    CleaningUp,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorState::Idle => f.write_str("idle"),
            ProcessorState::Preparing => f.write_str("preparing"),
            ProcessorState::Collecting => f.write_str("collecting"),
            ProcessorState::Parsing => f.write_str("parsing"),
            ProcessorState::Sorting => f.write_str("sorting"),
            ProcessorState::Depleting(phase) => write!(f, "depleting {phase}"),
            ProcessorState::CleaningUp => f.write_str("cleaning up"),
        }
    }
}

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Synchronization is disabled in the configuration.
    Disabled,
    /// [`SyncProcessor::prepare`] has not completed.
    NotPrepared,
    /// Nothing changed since the last pass and no pass was forced.
    Unchanged,
    /// Another pass is running.
    Busy,
}

/// Result of asking the processor for a pass.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// The pass did not run.
    Skipped(SkipReason),
    /// The pass ran to completion.
    Completed(PassReport),
}

impl PassOutcome {
    /// Returns true if the pass ran.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, PassOutcome::Completed(_))
    }

    /// The report of a completed pass.
    #[must_use]
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            PassOutcome::Completed(report) => Some(report),
            PassOutcome::Skipped(_) => None,
        }
    }

    /// The reason a pass was skipped.
    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            PassOutcome::Skipped(reason) => Some(*reason),
            PassOutcome::Completed(_) => None,
        }
    }
}

/// Per-pass scratch data, emptied at the end of every pass.
#[derive(Default)]
struct WorkingSet {
    queues: Vec<DefinitionQueue>,
    artifacts: BTreeMap<String, (usize, Artifact)>,
}

impl WorkingSet {
    fn clear(&mut self) {
        self.queues.clear();
        self.artifacts.clear();
    }

    fn has_pending(&self) -> bool {
        self.artifacts
            .values()
            .any(|(_, artifact)| artifact.lifecycle.is_pending())
    }
}

#[derive(Default)]
struct PhaseTally {
    processed: u64,
    failed: u64,
}

/// Reconciles a registry against a set of synchronizers.
pub struct SyncProcessor {
    config: EngineConfig,
    store: Arc<dyn DefinitionStore>,
    synchronizers: Vec<Arc<dyn Synchronizer>>,
    watcher: Arc<dyn ChangeWatcher>,
    context: SyncContext,
    state: RwLock<ProcessorState>,
    working: Mutex<WorkingSet>,
    prepared: AtomicBool,
    initialized: AtomicBool,
    forced: AtomicBool,
}

impl SyncProcessor {
    /// Creates a processor. Registration order of `synchronizers` is their
    /// priority order.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DefinitionStore>,
        synchronizers: Vec<Arc<dyn Synchronizer>>,
        watcher: Arc<dyn ChangeWatcher>,
    ) -> Self {
        Self {
            config,
            store,
            synchronizers,
            watcher,
            context: SyncContext::new(),
            state: RwLock::new(ProcessorState::Idle),
            working: Mutex::new(WorkingSet::default()),
            prepared: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            forced: AtomicBool::new(false),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registered synchronizers in priority order.
    #[must_use]
    pub fn synchronizers(&self) -> &[Arc<dyn Synchronizer>] {
        &self.synchronizers
    }

    /// Current state.
    pub fn state(&self) -> ProcessorState {
        *self.state.read()
    }

    /// Errors of the current or most recent pass.
    pub fn errors(&self) -> Vec<String> {
        self.context.errors()
    }

    /// Synchronizer name → health in the most recent pass.
    pub fn health(&self) -> BTreeMap<String, SynchronizerHealth> {
        self.context.health()
    }

    /// Cumulative statistics.
    pub fn stats(&self) -> SyncStats {
        self.context.stats()
    }

    /// Returns true once [`prepare`](Self::prepare) has completed.
    pub fn is_prepared(&self) -> bool {
        self.prepared.load(Ordering::SeqCst)
    }

    /// Returns true once a pass has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Makes the next pass run even if nothing changed.
    pub fn force(&self) {
        debug!("next pass forced");
        self.forced.store(true, Ordering::SeqCst);
    }

    /// One-time preparation: starts the watcher on the registry root and
    /// clears the `running` flag of every registered artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be started or a backing
    /// service fails; the processor then stays unprepared.
    pub fn prepare(&self) -> SyncResult<()> {
        let _working = self.working.lock();
        self.set_state(ProcessorState::Preparing);
        let result = self.prepare_services();
        self.set_state(ProcessorState::Idle);
        result?;

        self.prepared.store(true, Ordering::SeqCst);
        info!(
            root = %self.config.registry_root.display(),
            synchronizers = self.synchronizers.len(),
            "synchronization prepared"
        );
        Ok(())
    }

    /// Runs one pass, waiting for a running pass to finish first.
    pub fn process(&self) -> PassOutcome {
        let working = self.working.lock();
        self.guarded_pass(working)
    }

    /// Runs one pass unless another pass is running.
    pub fn try_process(&self) -> PassOutcome {
        match self.working.try_lock() {
            Some(working) => self.guarded_pass(working),
            None => self.skip(SkipReason::Busy),
        }
    }

    fn prepare_services(&self) -> SyncResult<()> {
        self.watcher.initialize(&self.config.registry_root)?;

        for sync in &self.synchronizers {
            let registered = sync.service().get_all()?;
            for mut artifact in registered.into_iter().filter(|a| a.running) {
                artifact.running = false;
                sync.service().save(&artifact)?;
                trace!(key = %artifact.key, "cleared running flag");
            }
        }
        Ok(())
    }

    fn guarded_pass(&self, mut working: MutexGuard<'_, WorkingSet>) -> PassOutcome {
        if let Some(reason) = self.check_guards() {
            return self.skip(reason);
        }
        PassOutcome::Completed(self.run_pass(&mut working))
    }

    fn check_guards(&self) -> Option<SkipReason> {
        if !self.config.enabled {
            return Some(SkipReason::Disabled);
        }
        if !self.is_prepared() {
            warn!("synchronization is not prepared yet; skipping pass");
            return Some(SkipReason::NotPrepared);
        }
        if self.is_initialized()
            && !self.watcher.is_modified()
            && !self.forced.load(Ordering::SeqCst)
        {
            return Some(SkipReason::Unchanged);
        }
        None
    }

    fn skip(&self, reason: SkipReason) -> PassOutcome {
        trace!(reason = ?reason, "pass skipped");
        self.context.update_stats(|stats| stats.passes_skipped += 1);
        PassOutcome::Skipped(reason)
    }

    fn run_pass(&self, working: &mut WorkingSet) -> PassReport {
        let pass_id = Uuid::new_v4();
        let span = info_span!("sync_pass", pass_id = %pass_id);
        let _enter = span.enter();
        let started = Instant::now();

        self.watcher.reset();
        self.forced.store(false, Ordering::SeqCst);
        self.context.clear_errors();
        working.clear();
        for sync in &self.synchronizers {
            self.context.set_health(sync.name(), SynchronizerHealth::Running);
        }
        debug!("pass started");

        self.set_state(ProcessorState::Collecting);
        let walked = self.collect(working);
        let collected: usize = working.queues.iter().map(BTreeMap::len).sum();

        self.set_state(ProcessorState::Parsing);
        let (parsed, broken) = self.load_definitions(working);
        let artifacts = working.artifacts.len();

        let phases_run = working.has_pending();
        let tally = if phases_run {
            self.run_phases(working)
        } else {
            debug!(artifacts, "no new or modified artifacts");
            PhaseTally::default()
        };

        self.set_state(ProcessorState::CleaningUp);
        let cleaned = if walked {
            self.cleanup()
        } else {
            warn!("registry walk failed; cleanup skipped");
            0
        };

        working.clear();
        for sync in &self.synchronizers {
            if self.context.health_of(sync.name()) != Some(SynchronizerHealth::Failed) {
                self.context.set_health(sync.name(), SynchronizerHealth::Succeeded);
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        self.context.flush_errors();

        let duration = started.elapsed();
        self.context.update_stats(|stats| {
            stats.passes_completed += 1;
            stats.definitions_parsed += parsed as u64;
            stats.definitions_broken += broken as u64;
            stats.artifacts_processed += tally.processed;
            stats.artifacts_failed += tally.failed;
            stats.artifacts_cleaned += cleaned as u64;
            stats.last_pass_time = Some(Instant::now());
            stats.last_pass_duration = duration;
        });
        self.set_state(ProcessorState::Idle);

        let errors = self.context.errors();
        info!(
            collected,
            parsed,
            broken,
            artifacts,
            cleaned,
            errors = errors.len(),
            elapsed_ms = duration.as_millis() as u64,
            "pass completed"
        );

        PassReport {
            pass_id,
            collected,
            parsed,
            broken,
            artifacts,
            phases_run,
            cleaned,
            errors,
            duration,
        }
    }

    /// Walks the registry into per-synchronizer queues. Returns false if the
    /// registry root itself could not be walked.
    fn collect(&self, working: &mut WorkingSet) -> bool {
        let walker = RegistryWalker::new(&self.config.registry_root)
            .follow_links(self.config.follow_links);
        let mut collector = DefinitionCollector::new(self.store.as_ref(), self.synchronizers.len());

        let walk = walker.walk(|path, metadata, location| {
            if let Some(index) = claim(&self.synchronizers, path, metadata) {
                let outcome = collector.collect_file(index, path, location);
                trace!(location = %location, outcome = %outcome, "collected");
            }
        });

        let (queues, errors) = collector.finish();
        working.queues = queues;
        self.context.extend_errors(errors);

        match walk {
            Ok(report) => {
                for e in report.errors {
                    self.context
                        .record_error(format!("Failed to visit registry entry: {e}"));
                }
                debug!(visited = report.visited, "registry walked");
                true
            }
            Err(e) => {
                self.context.record_error(format!(
                    "Failed to walk registry {}: {e}",
                    self.config.registry_root.display()
                ));
                false
            }
        }
    }

    /// Parses queued definitions into the artifact working set. Returns the
    /// number of definitions parsed and broken.
    fn load_definitions(&self, working: &mut WorkingSet) -> (usize, usize) {
        let mut parsed = 0;
        let mut broken = 0;
        let queues = std::mem::take(&mut working.queues);

        for (index, queue) in queues.into_iter().enumerate() {
            let sync = &self.synchronizers[index];
            for (location, mut definition) in queue {
                let loaded = match definition.state {
                    state if state.needs_parse() => {
                        let Some(content) = definition.content.take() else {
                            self.context.record_error(format!(
                                "Content of {location} has not been loaded correctly"
                            ));
                            continue;
                        };
                        match self.guarded(sync.as_ref(), "parse", || sync.parse(&location, &content)) {
                            Ok(mut artifacts) => {
                                if definition.state == DefinitionState::Modified {
                                    for artifact in &mut artifacts {
                                        if artifact.lifecycle == ArtifactLifecycle::New {
                                            artifact.lifecycle = ArtifactLifecycle::Modified;
                                        }
                                    }
                                }
                                definition.set_state(DefinitionState::Parsed, None);
                                self.save_definition(&definition);
                                parsed += 1;
                                artifacts
                            }
                            Err(e) => {
                                definition.set_state(DefinitionState::Broken, Some(e.to_string()));
                                self.save_definition(&definition);
                                self.context
                                    .record_error(format!("Failed to parse {location}: {e}"));
                                broken += 1;
                                continue;
                            }
                        }
                    }
                    DefinitionState::Parsed => {
                        match self.guarded(sync.as_ref(), "retrieve", || sync.retrieve(&location)) {
                            Ok(artifacts) => artifacts,
                            Err(e) => {
                                self.context.record_error(format!(
                                    "Failed to retrieve artifacts of {location}: {e}"
                                ));
                                continue;
                            }
                        }
                    }
                    _ => continue,
                };

                trace!(location = %location, artifacts = loaded.len(), "definition loaded");
                for artifact in loaded {
                    working
                        .artifacts
                        .insert(artifact.key.clone(), (index, artifact));
                }
            }
        }

        (parsed, broken)
    }

    fn run_phases(&self, working: &mut WorkingSet) -> PhaseTally {
        self.set_state(ProcessorState::Sorting);
        let artifacts = std::mem::take(&mut working.artifacts);
        let wrappers = TopologyWrapper::wrap_all(artifacts.into_values(), &self.synchronizers);
        let types: HashMap<String, String> = wrappers
            .iter()
            .map(|w| (w.id().to_string(), w.artifact().artifact_type.clone()))
            .collect();

        let outcome = TopologicalSorter::new().sort(&wrappers);
        if !outcome.is_acyclic() {
            warn!(
                count = outcome.cyclic.len(),
                "artifacts caught in a dependency cycle"
            );
        }

        let mut groups: Vec<Vec<TopologyWrapper>> =
            self.synchronizers.iter().map(|_| Vec::new()).collect();
        for wrapper in outcome.arrange(wrappers) {
            let owner = wrapper.owner();
            groups[owner].push(wrapper);
        }

        let mut tally = PhaseTally::default();
        let mut halted = vec![false; groups.len()];
        for phase in ArtifactPhase::ALL {
            if phase == ArtifactPhase::Create {
                for group in &mut groups {
                    group.reverse();
                }
            }
            self.deplete_phase(phase, &mut groups, &mut halted, &types, &mut tally);
        }
        tally
    }

    /// Runs one phase over every group until a sweep makes no progress.
    ///
    /// A group whose synchronizer panics is halted for the rest of the pass;
    /// its unprocessed nodes are reported as undepleted in every remaining
    /// phase.
    fn deplete_phase(
        &self,
        phase: ArtifactPhase,
        groups: &mut [Vec<TopologyWrapper>],
        halted: &mut [bool],
        types: &HashMap<String, String>,
        tally: &mut PhaseTally,
    ) {
        self.set_state(ProcessorState::Depleting(phase));
        let depleter = TopologicalDepleter::new();
        let mut ledger = PhaseLedger::new(phase);

        loop {
            let mut progress = 0;
            for (index, group) in groups.iter_mut().enumerate() {
                if halted[index] || group.is_empty() {
                    continue;
                }
                let sync = &self.synchronizers[index];
                match self.guarded(sync.as_ref(), phase.as_str(), || {
                    Ok(depleter.deplete(group.as_mut_slice(), &mut ledger))
                }) {
                    Ok(processed) => progress += processed,
                    Err(e) => {
                        self.context.record_error(e.to_string());
                        halted[index] = true;
                        // Nodes completed before the panic may unblock other groups.
                        progress += 1;
                    }
                }
            }
            if progress == 0 {
                break;
            }
        }

        tally.processed += ledger.succeeded_count() as u64;
        for failure in ledger.failures() {
            let artifact_type = types.get(&failure.id).map_or("", String::as_str);
            self.context.record_error(format!(
                "Failed artifact of type: [{artifact_type}] with key: [{}] in phase: [{phase}]: {}",
                failure.id, failure.message
            ));
            tally.failed += 1;
        }

        for (index, group) in groups.iter_mut().enumerate() {
            let sync = &self.synchronizers[index];
            for i in depleter.undepleted(group.as_slice(), &ledger) {
                let wrapper = &mut group[i];
                let message = format!(
                    "Undepleted artifact of type: [{}] with key: [{}] in phase: [{phase}]",
                    wrapper.artifact().artifact_type,
                    wrapper.id()
                );
                self.context.record_error(message.clone());
                tally.failed += 1;
                // A failing set_status must not stop the remaining nodes.
                if let Err(e) = self.guarded(sync.as_ref(), "set_status", || {
                    wrapper.fail(phase, message);
                    Ok(())
                }) {
                    self.context.record_error(e.to_string());
                }
            }
        }
    }

    /// Cleans up registered artifacts whose source file no longer exists.
    fn cleanup(&self) -> usize {
        let root = &self.config.registry_root;
        let mut cleaned = 0;

        for sync in &self.synchronizers {
            let registered = match self.guarded(sync.as_ref(), "cleanup", || sync.service().get_all()) {
                Ok(registered) => registered,
                Err(e) => {
                    self.context.record_error(format!(
                        "Failed to list artifacts of {}: {e}",
                        sync.name()
                    ));
                    continue;
                }
            };

            for artifact in registered {
                if !sync.accepts_type(&artifact.artifact_type)
                    || path_of(root, &artifact.location).exists()
                {
                    continue;
                }

                match self.guarded(sync.as_ref(), "cleanup", || sync.cleanup(&artifact)) {
                    Ok(()) => {
                        info!(key = %artifact.key, location = %artifact.location, "artifact cleaned up");
                        cleaned += 1;
                        self.mark_deleted(&artifact.location);
                    }
                    Err(e @ SyncError::Cleanup { .. }) => self.context.record_error(e.to_string()),
                    Err(e) => {
                        let error = SyncError::cleanup(&artifact.key, e.to_string());
                        self.context.record_error(error.to_string());
                    }
                }

                if self.config.cleanup_policy == CleanupPolicy::FirstMissing {
                    break;
                }
            }
        }

        cleaned
    }

    fn mark_deleted(&self, location: &str) {
        match self.store.find_by_location(location) {
            Ok(Some(mut definition)) if definition.state != DefinitionState::Deleted => {
                definition.set_state(DefinitionState::Deleted, None);
                self.save_definition(&definition);
            }
            Ok(_) => {}
            Err(e) => self
                .context
                .record_error(format!("Definition store failed for {location}: {e}")),
        }
    }

    fn save_definition(&self, definition: &regsync_core::Definition) {
        if let Err(e) = self.store.save(definition) {
            self.context.record_error(format!(
                "Definition store failed for {}: {e}",
                definition.key()
            ));
        }
    }

    /// Calls into a synchronizer, turning a panic into an error and marking
    /// the synchronizer failed.
    fn guarded<T>(
        &self,
        sync: &dyn Synchronizer,
        operation: &str,
        f: impl FnOnce() -> SyncResult<T>,
    ) -> SyncResult<T> {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.context.set_health(sync.name(), SynchronizerHealth::Failed);
                Err(SyncError::synchronizer(format!(
                    "{} panicked during {operation}: {message}",
                    sync.name()
                )))
            }
        }
    }

    fn set_state(&self, state: ProcessorState) {
        *self.state.write() = state;
    }
}

impl fmt::Debug for SyncProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncProcessor")
            .field("registry_root", &self.config.registry_root)
            .field("synchronizers", &self.synchronizers.len())
            .field("state", &self.state())
            .field("prepared", &self.is_prepared())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
