//! # regsync engine
//!
//! Topological reconciliation of a declarative registry.
//!
//! This crate provides:
//! - The [`Synchronizer`] capability interface for per-type handlers
//! - Registry walking and checksum-based change collection
//! - Dependency sorting and phase depletion with cycle tolerance
//! - The [`SyncProcessor`] pass state machine with its guards
//! - Change watchers and a tokio-based periodic [`SyncScheduler`]
//!
//! ## Pass model
//!
//! Each pass walks the registry, reconciles files against the definition
//! store, parses changed definitions into artifacts, and drives those
//! artifacts through PREPARE, CREATE, UPDATE and START. Artifacts run only
//! after everything they depend on has succeeded in the same phase.
//! Artifacts whose source file has disappeared are cleaned up last.
//!
//! ## Key Invariants
//!
//! - At most one pass runs at a time
//! - Every phase finishes for all synchronizers before the next begins
//! - A failing file, definition or artifact never aborts the pass
//! - Cycles and missing dependencies surface as errors, never as panics
//! - Registration order decides which synchronizer claims a file

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collector;
mod config;
mod context;
mod error;
mod processor;
mod scheduler;
mod synchronizer;
mod topology;
mod walker;
mod watcher;

pub use collector::{claim, Collected, DefinitionCollector, DefinitionQueue};
pub use config::{CleanupPolicy, EngineConfig};
pub use context::{PassReport, SyncContext, SyncStats, SynchronizerHealth};
pub use error::{SyncError, SyncResult};
pub use processor::{PassOutcome, ProcessorState, SkipReason, SyncProcessor};
pub use scheduler::SyncScheduler;
pub use synchronizer::{ArtifactService, Synchronizer};
pub use topology::{
    Depletable, DepletionFailure, DepletionOutcome, PhaseLedger, SortOutcome, TopologicalDepleter,
    TopologicalSorter, TopologyNode, TopologyWrapper,
};
pub use walker::{location_of, path_of, RegistryWalker, WalkReport};
pub use watcher::{ChangeWatcher, ManualWatcher, NotifyWatcher};

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
