//! Topological sorting with cycle tolerance.

use super::TopologyNode;
use std::collections::HashSet;

/// Result of a topological sort, as indices into the input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOutcome {
    /// Nodes in dependency order: every node follows the nodes it depends on.
    pub order: Vec<usize>,
    /// Nodes that never became ready (cycles, or dependents of cycles), in
    /// input order.
    pub cyclic: Vec<usize>,
}

impl SortOutcome {
    /// Returns true if every node was ordered.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.cyclic.is_empty()
    }

    /// Returns the full sequence: ordered nodes followed by the cyclic
    /// remainder.
    #[must_use]
    pub fn into_sequence(self) -> Vec<usize> {
        let mut sequence = self.order;
        sequence.extend(self.cyclic);
        sequence
    }

    /// Rearranges `items` (parallel to the sorted input) into the full
    /// sequence.
    #[must_use]
    pub fn arrange<T>(self, items: Vec<T>) -> Vec<T> {
        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        self.into_sequence()
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect()
    }
}

/// Orders nodes so that dependencies precede their dependents.
///
/// Each round removes every node whose dependencies are no longer pending,
/// keeping input order within the round. Dependencies on ids outside the
/// input are ignored here; the depleter deals with them. When a round
/// removes nothing, the rest is returned as the cyclic remainder instead of
/// failing the sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalSorter;

impl TopologicalSorter {
    /// Creates a sorter.
    pub fn new() -> Self {
        Self
    }

    /// Sorts the nodes.
    pub fn sort<N: TopologyNode>(&self, nodes: &[N]) -> SortOutcome {
        let mut pending: Vec<usize> = (0..nodes.len()).collect();
        let mut pending_ids: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();
        let mut order = Vec::with_capacity(nodes.len());

        while !pending.is_empty() {
            let (ready, blocked): (Vec<usize>, Vec<usize>) = pending.iter().partition(|&&i| {
                nodes[i]
                    .dependencies()
                    .iter()
                    .all(|dep| !pending_ids.contains(dep.as_str()))
            });

            if ready.is_empty() {
                break;
            }

            for &i in &ready {
                pending_ids.remove(nodes[i].id());
            }
            order.extend(ready);
            pending = blocked;
        }

        SortOutcome {
            order,
            cyclic: pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::test_nodes::Node;

    fn ids(nodes: &[Node], indices: &[usize]) -> Vec<String> {
        indices.iter().map(|&i| nodes[i].id.clone()).collect()
    }

    #[test]
    fn dependencies_come_first() {
        let nodes = vec![
            Node::new("view", &["table"]),
            Node::new("table", &["schema"]),
            Node::new("schema", &[]),
        ];

        let outcome = TopologicalSorter::new().sort(&nodes);
        assert!(outcome.is_acyclic());
        assert_eq!(ids(&nodes, &outcome.order), vec!["schema", "table", "view"]);
    }

    #[test]
    fn independent_nodes_keep_input_order() {
        let nodes = vec![Node::new("b", &[]), Node::new("a", &[]), Node::new("c", &[])];
        let outcome = TopologicalSorter::new().sort(&nodes);
        assert_eq!(ids(&nodes, &outcome.order), vec!["b", "a", "c"]);
    }

    #[test]
    fn missing_dependency_does_not_block_sort() {
        let nodes = vec![Node::new("view", &["nowhere"])];
        let outcome = TopologicalSorter::new().sort(&nodes);
        assert_eq!(outcome.order, vec![0]);
    }

    #[test]
    fn cycles_are_returned_not_fatal() {
        let nodes = vec![
            Node::new("a", &["b"]),
            Node::new("free", &[]),
            Node::new("b", &["a"]),
            Node::new("after", &["a"]),
        ];

        let outcome = TopologicalSorter::new().sort(&nodes);
        assert_eq!(ids(&nodes, &outcome.order), vec!["free"]);
        assert_eq!(ids(&nodes, &outcome.cyclic), vec!["a", "b", "after"]);
        assert_eq!(outcome.into_sequence(), vec![1, 0, 2, 3]);
    }

    #[test]
    fn self_dependency_is_cyclic() {
        let nodes = vec![Node::new("loop", &["loop"])];
        let outcome = TopologicalSorter::new().sort(&nodes);
        assert!(outcome.order.is_empty());
        assert_eq!(outcome.cyclic, vec![0]);
    }

    #[test]
    fn arrange_moves_items() {
        let nodes = vec![Node::new("b", &["a"]), Node::new("a", &[])];
        let outcome = TopologicalSorter::new().sort(&nodes);
        let arranged = outcome.arrange(nodes);
        let order: Vec<_> = arranged.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
