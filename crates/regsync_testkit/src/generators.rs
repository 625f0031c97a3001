//! Property-based test generators using proptest.
//!
//! Graphs are generated as node lists whose dependencies only point at
//! nodes created earlier, which guarantees acyclicity; the list is then
//! shuffled so input order carries no hint of the dependency order.

use proptest::prelude::*;
use regsync_core::ArtifactPhase;
use regsync_engine::{Depletable, SyncError, SyncResult, TopologyNode};

/// A plain dependency-graph node that records the phases it completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Node identity.
    pub id: String,
    /// Identities of the nodes this one depends on.
    pub dependencies: Vec<String>,
    /// Whether completing this node fails.
    pub fails: bool,
    /// Phases completed so far.
    pub completed: Vec<ArtifactPhase>,
}

impl GraphNode {
    /// Creates a node.
    pub fn new(id: impl Into<String>, dependencies: &[&str]) -> Self {
        Self {
            id: id.into(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            fails: false,
            completed: Vec::new(),
        }
    }
}

impl TopologyNode for GraphNode {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

impl Depletable for GraphNode {
    fn complete(&mut self, phase: ArtifactPhase) -> SyncResult<()> {
        if self.fails {
            return Err(SyncError::phase(&self.id, phase, "generated failure"));
        }
        self.completed.push(phase);
        Ok(())
    }
}

/// Strategy for acyclic graphs of `1..max_nodes` nodes in shuffled order.
pub fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<GraphNode>> {
    (1..max_nodes.max(2))
        .prop_flat_map(|n| {
            prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), n)
        })
        .prop_map(|picks| {
            picks
                .into_iter()
                .enumerate()
                .map(|(i, targets)| {
                    let mut dependencies: Vec<String> = if i == 0 {
                        Vec::new()
                    } else {
                        targets
                            .iter()
                            .map(|target| format!("node-{}", target.index(i)))
                            .collect()
                    };
                    dependencies.sort();
                    dependencies.dedup();
                    GraphNode {
                        id: format!("node-{i}"),
                        dependencies,
                        fails: false,
                        completed: Vec::new(),
                    }
                })
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Strategy for an acyclic graph plus a closed cycle of `2..=max_cycle`
/// nodes (`cycle-0 → cycle-1 → … → cycle-0`), all in shuffled order.
pub fn dag_with_cycle_strategy(
    max_nodes: usize,
    max_cycle: usize,
) -> impl Strategy<Value = Vec<GraphNode>> {
    (dag_strategy(max_nodes), 2..=max_cycle.max(2))
        .prop_map(|(mut nodes, cycle_len)| {
            for i in 0..cycle_len {
                let next = format!("cycle-{}", (i + 1) % cycle_len);
                nodes.push(GraphNode::new(format!("cycle-{i}"), &[next.as_str()]));
            }
            nodes
        })
        .prop_shuffle()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_dags_reference_existing_nodes(nodes in dag_strategy(16)) {
            let ids: std::collections::HashSet<_> = nodes.iter().map(|n| n.id.clone()).collect();
            for node in &nodes {
                for dep in &node.dependencies {
                    prop_assert!(ids.contains(dep));
                    prop_assert_ne!(dep, &node.id);
                }
            }
        }

        #[test]
        fn cycle_nodes_are_present(nodes in dag_with_cycle_strategy(8, 4)) {
            prop_assert!(nodes.iter().any(|n| n.id == "cycle-0"));
            prop_assert!(nodes.iter().any(|n| n.id == "cycle-1"));
        }
    }
}
