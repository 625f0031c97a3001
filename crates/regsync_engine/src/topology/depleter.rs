//! Dependency-aware phase execution.

use super::{Depletable, TopologyNode};
use regsync_core::ArtifactPhase;
use std::collections::HashSet;

/// A node that was processed but whose handler failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepletionFailure {
    /// Node identity.
    pub id: String,
    /// Handler error message.
    pub message: String,
}

/// Bookkeeping for one phase, shared by every group depleted in it.
#[derive(Debug, Clone)]
pub struct PhaseLedger {
    phase: ArtifactPhase,
    processed: HashSet<String>,
    succeeded: HashSet<String>,
    failures: Vec<DepletionFailure>,
}

impl PhaseLedger {
    /// Creates an empty ledger for a phase.
    pub fn new(phase: ArtifactPhase) -> Self {
        Self {
            phase,
            processed: HashSet::new(),
            succeeded: HashSet::new(),
            failures: Vec::new(),
        }
    }

    /// The phase this ledger tracks.
    #[must_use]
    pub fn phase(&self) -> ArtifactPhase {
        self.phase
    }

    /// Returns true if the node was processed in this phase.
    #[must_use]
    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Returns true if the node succeeded in this phase.
    #[must_use]
    pub fn has_succeeded(&self, id: &str) -> bool {
        self.succeeded.contains(id)
    }

    /// Number of nodes that succeeded.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Failures in the order they happened.
    #[must_use]
    pub fn failures(&self) -> &[DepletionFailure] {
        &self.failures
    }

    fn record_success(&mut self, id: String) {
        self.processed.insert(id.clone());
        self.succeeded.insert(id);
    }

    fn record_failure(&mut self, id: String, message: String) {
        self.processed.insert(id.clone());
        self.failures.push(DepletionFailure { id, message });
    }
}

/// Result of depleting one group with a fresh ledger.
#[derive(Debug, Clone, Default)]
pub struct DepletionOutcome {
    /// Ids of nodes that succeeded, in input order.
    pub succeeded: Vec<String>,
    /// Nodes whose handler failed.
    pub failed: Vec<DepletionFailure>,
    /// Indices of nodes that never became ready.
    pub undepleted: Vec<usize>,
}

/// Drives nodes through a phase in dependency order.
///
/// A node runs once all of its dependencies have succeeded in the same
/// phase. A failed dependency blocks its dependents for the rest of the
/// phase; so does a dependency that is missing or part of a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalDepleter;

impl TopologicalDepleter {
    /// Creates a depleter.
    pub fn new() -> Self {
        Self
    }

    /// Completes every ready node, repeating until a round makes no
    /// progress. Returns the number of nodes processed by this call.
    pub fn deplete<N: Depletable>(&self, nodes: &mut [N], ledger: &mut PhaseLedger) -> usize {
        let phase = ledger.phase();
        let mut total = 0;

        loop {
            let mut round = 0;
            for node in nodes.iter_mut() {
                if ledger.is_processed(node.id()) {
                    continue;
                }
                let ready = node
                    .dependencies()
                    .iter()
                    .all(|dep| ledger.has_succeeded(dep));
                if !ready {
                    continue;
                }

                let id = node.id().to_string();
                match node.complete(phase) {
                    Ok(()) => ledger.record_success(id),
                    Err(e) => ledger.record_failure(id, e.to_string()),
                }
                round += 1;
            }

            if round == 0 {
                break;
            }
            total += round;
        }

        total
    }

    /// Indices of nodes the ledger has not processed.
    #[must_use]
    pub fn undepleted<N: TopologyNode>(&self, nodes: &[N], ledger: &PhaseLedger) -> Vec<usize> {
        nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !ledger.is_processed(node.id()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Depletes a single group to a fixpoint with a fresh ledger.
    pub fn deplete_all<N: Depletable>(&self, nodes: &mut [N], phase: ArtifactPhase) -> DepletionOutcome {
        let mut ledger = PhaseLedger::new(phase);
        self.deplete(nodes, &mut ledger);

        let succeeded = nodes
            .iter()
            .filter(|node| ledger.has_succeeded(node.id()))
            .map(|node| node.id().to_string())
            .collect();
        let undepleted = self.undepleted(nodes, &ledger);

        DepletionOutcome {
            succeeded,
            failed: ledger.failures,
            undepleted,
        }
    }
}
