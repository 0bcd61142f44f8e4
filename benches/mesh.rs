use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use railmesh::ir::{EdgeSpec, NodeSpec};
use railmesh::mesh::{
    Bounds, GridPoint, GrowthPriority, RouteQuery, Tiling, TilingLimits, build_competition_mesh,
    build_fast_mesh, discouraged_weight, shortest_path,
};
use railmesh::{MeshConfig, MeshInput, compute_mesh};
use std::collections::HashSet;
use std::hint::black_box;

/// Deterministic scatter of `count` distinct points inside a `size`×`size` box.
fn scattered_points(count: usize, size: i32) -> Vec<GridPoint> {
    let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut seen = HashSet::new();
    let mut points = Vec::with_capacity(count);
    while points.len() < count {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        let x = (seed % (size as u64 - 1)) as i32 + 1;
        let y = ((seed >> 32) % (size as u64 - 1)) as i32 + 1;
        if seen.insert((x, y)) {
            points.push(GridPoint::new(x, y));
        }
    }
    points
}

fn chain_input(count: usize, size: i32) -> MeshInput {
    let points = scattered_points(count, size);
    let nodes = points
        .iter()
        .enumerate()
        .map(|(i, p)| NodeSpec {
            id: format!("N{i}"),
            x: p.x,
            y: p.y,
            weight: None,
            zoom_level: Some(1 + (i % 4) as u32),
        })
        .collect();
    let edges = (1..count)
        .map(|i| EdgeSpec {
            from: format!("N{}", i - 1),
            to: format!("N{i}"),
            zoom_level: None,
        })
        .collect();
    MeshInput {
        width: size,
        height: size,
        nodes,
        edges,
    }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_build");
    for (count, size) in [(50usize, 200i32), (200, 400), (800, 1000)] {
        let points = scattered_points(count, size);
        let bounds = Bounds::new(size, size);
        group.bench_with_input(BenchmarkId::new("fast", count), &points, |b, points| {
            b.iter(|| {
                let mut tiling = Tiling::new(points, TilingLimits::default()).expect("tiling");
                let report = build_fast_mesh(&mut tiling, bounds).expect("fast build");
                black_box(report.junctions);
            });
        });
        if count <= 200 {
            group.bench_with_input(BenchmarkId::new("competition", count), &points, |b, points| {
                b.iter(|| {
                    let mut tiling = Tiling::new(points, TilingLimits::default()).expect("tiling");
                    let report = build_competition_mesh(&mut tiling, bounds, GrowthPriority::Uniform)
                        .expect("competition build");
                    black_box(report.rounds);
                });
            });
        }
    }
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_routing");
    for (count, size) in [(200usize, 400i32), (800, 1000)] {
        let points = scattered_points(count, size);
        let mut tiling = Tiling::new(&points, TilingLimits::default()).expect("tiling");
        build_fast_mesh(&mut tiling, Bounds::new(size, size)).expect("fast build");
        let weight = discouraged_weight(1000.0);
        group.bench_with_input(BenchmarkId::from_parameter(count), &tiling, |b, tiling| {
            b.iter(|| {
                let query = RouteQuery {
                    source: 0,
                    target: count - 1,
                    zoom: 1,
                };
                let outcome = shortest_path(black_box(tiling), &query, &weight);
                black_box(outcome.length);
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh_end_to_end");
    let config = MeshConfig::default();
    for (count, size) in [(50usize, 200i32), (200, 400)] {
        let input = chain_input(count, size);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| {
                let layout = compute_mesh(black_box(input), &config).expect("pipeline");
                black_box(layout.stats.rails);
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_build, bench_routing, bench_end_to_end
);
criterion_main!(benches);
