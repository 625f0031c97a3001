//! Dependency sorting and phase depletion benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use regsync_bench::random_dag;
use regsync_core::ArtifactPhase;
use regsync_engine::{TopologicalDepleter, TopologicalSorter};
use regsync_testkit::GraphNode;

/// Benchmark sorting acyclic graphs.
fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");

    for size in [100, 1_000, 5_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let nodes = random_dag(size, 4, 42);
            b.iter(|| {
                let outcome = TopologicalSorter::new().sort(black_box(&nodes));
                black_box(outcome);
            });
        });
    }
    group.finish();
}

/// Benchmark sorting a graph whose tail is one long cycle.
fn bench_sort_with_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_cycle");

    for size in [100, 1_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut nodes = random_dag(size, 4, 42);
            let cycle = size / 10;
            for i in 0..cycle {
                let next = format!("cycle-{}", (i + 1) % cycle);
                nodes.push(GraphNode::new(format!("cycle-{i}"), &[next.as_str()]));
            }
            b.iter(|| {
                let outcome = TopologicalSorter::new().sort(black_box(&nodes));
                black_box(outcome);
            });
        });
    }
    group.finish();
}

/// Benchmark depleting every phase, with and without sorting first.
fn bench_deplete(c: &mut Criterion) {
    let mut group = c.benchmark_group("deplete_all_phases");

    for size in [100, 1_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("unsorted", size), size, |b, &size| {
            let nodes = random_dag(size, 4, 42);
            b.iter(|| {
                let mut nodes = nodes.clone();
                for phase in ArtifactPhase::ALL {
                    black_box(TopologicalDepleter::new().deplete_all(&mut nodes, phase));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("sorted", size), size, |b, &size| {
            let nodes = random_dag(size, 4, 42);
            b.iter(|| {
                let outcome = TopologicalSorter::new().sort(&nodes);
                let mut nodes = outcome.arrange(nodes.clone());
                for phase in ArtifactPhase::ALL {
                    black_box(TopologicalDepleter::new().deplete_all(&mut nodes, phase));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sort, bench_sort_with_cycle, bench_deplete);
criterion_main!(benches);
