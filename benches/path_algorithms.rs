use criterion::{black_box, criterion_group, criterion_main, Criterion};
use route_orchestrator::algorithms::{BellmanFord, Dijkstra, PathAlgorithm};
use route_orchestrator::cache::Fingerprint;
use route_orchestrator::graph::Graph;
use route_orchestrator::AlgorithmHint;

/// Grid graph with right and down edges, weights varying by position
fn grid(side: usize) -> Graph {
    let node = |row: usize, col: usize| format!("r{row}c{col}");
    let mut edges = Vec::new();
    for row in 0..side {
        for col in 0..side {
            let weight = ((row * 7 + col * 13) % 10 + 1) as f64;
            if col + 1 < side {
                edges.push((node(row, col), node(row, col + 1), weight));
            }
            if row + 1 < side {
                edges.push((node(row, col), node(row + 1, col), weight));
            }
        }
    }
    Graph::from_edges(edges).expect("grid edges are valid")
}

fn benchmark_dijkstra(c: &mut Criterion) {
    let graph = grid(30);
    c.bench_function("dijkstra_grid_30", |b| {
        b.iter(|| Dijkstra.find_path(black_box(&graph), "r0c0", "r29c29"))
    });
}

fn benchmark_bellman_ford(c: &mut Criterion) {
    let graph = grid(30);
    c.bench_function("bellman_ford_grid_30", |b| {
        b.iter(|| BellmanFord.find_path(black_box(&graph), "r0c0", "r29c29"))
    });
}

fn benchmark_fingerprint(c: &mut Criterion) {
    let graph = grid(30);
    c.bench_function("fingerprint_grid_30", |b| {
        b.iter(|| {
            Fingerprint::compute(
                &black_box(&graph).content_hash(),
                "r0c0",
                "r29c29",
                AlgorithmHint::Auto,
            )
        })
    });
}

criterion_group!(
    benches,
    benchmark_dijkstra,
    benchmark_bellman_ford,
    benchmark_fingerprint
);
criterion_main!(benches);
