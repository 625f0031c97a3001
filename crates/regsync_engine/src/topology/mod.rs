//! Dependency ordering and phase depletion.
//!
//! Artifacts declare the keys of the artifacts they require. The
//! [`TopologicalSorter`] turns that into an order where dependencies come
//! first; the [`TopologicalDepleter`] then drives nodes through one phase,
//! deferring every node until all of its dependencies have succeeded in
//! that phase. Neither component fails on cycles or missing dependencies:
//! such nodes simply never become ready and are reported as undepleted.

mod depleter;
mod sorter;
mod wrapper;

pub use depleter::{DepletionFailure, DepletionOutcome, PhaseLedger, TopologicalDepleter};
pub use sorter::{SortOutcome, TopologicalSorter};
pub use wrapper::TopologyWrapper;

use crate::error::SyncResult;
use regsync_core::ArtifactPhase;

/// A node in the dependency graph.
pub trait TopologyNode {
    /// Unique identity of the node.
    fn id(&self) -> &str;

    /// Identities of the nodes this one depends on.
    fn dependencies(&self) -> &[String];
}

/// A node that can be driven through a phase.
pub trait Depletable: TopologyNode {
    /// Runs the node's handler for a phase.
    ///
    /// # Errors
    ///
    /// Returns the handler's error; the node then counts as processed but
    /// failed, and dependents never become ready in this phase.
    fn complete(&mut self, phase: ArtifactPhase) -> SyncResult<()>;
}
