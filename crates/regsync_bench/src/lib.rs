//! Benchmark utilities.

#![warn(missing_docs)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regsync_testkit::{GraphNode, TempRegistry};

/// Generates an acyclic graph of `count` nodes where each node depends on
/// up to `max_deps` earlier nodes, returned in shuffled order.
pub fn random_dag(count: usize, max_deps: usize, seed: u64) -> Vec<GraphNode> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut nodes: Vec<GraphNode> = (0..count)
        .map(|i| {
            let mut node = GraphNode::new(format!("node-{i}"), &[]);
            if i > 0 {
                let deps = rng.gen_range(0..=max_deps.min(i));
                for _ in 0..deps {
                    node.dependencies.push(format!("node-{}", rng.gen_range(0..i)));
                }
                node.dependencies.sort();
                node.dependencies.dedup();
            }
            node
        })
        .collect();

    for i in (1..nodes.len()).rev() {
        let j = rng.gen_range(0..=i);
        nodes.swap(i, j);
    }
    nodes
}

/// Writes `count` table definitions into `registry`, each depending on up
/// to `max_deps` earlier tables. Returns the written locations.
pub fn populate_registry(
    registry: &TempRegistry,
    count: usize,
    max_deps: usize,
    seed: u64,
) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut locations = Vec::with_capacity(count);

    for i in 0..count {
        let location = format!("/schema/{:02}/t{i}.table", i % 16);
        let mut content = format!("name = T{i}\n");
        if i > 0 {
            for _ in 0..rng.gen_range(0..=max_deps.min(i)) {
                let dep = rng.gen_range(0..i);
                content.push_str(&format!(
                    "depends = table:/schema/{:02}/t{dep}.table:T{dep}\n",
                    dep % 16
                ));
            }
        }
        registry.write(&location, content);
        locations.push(location);
    }
    locations
}
