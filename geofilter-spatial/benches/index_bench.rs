//! Spatial index benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use geofilter::geometry::Envelope;
use geofilter_spatial::{QuadTree, RTree, SpatialIndexEntry};
use std::hint::black_box;

fn grid_envelope(i: usize) -> Envelope {
    let x = (i % 100) as f64;
    let y = (i / 100) as f64;
    Envelope::new(x, y, x + 1.0, y + 1.0)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Index Insert");
    let root = Envelope::new(0.0, 0.0, 101.0, 101.0);

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::new("quadtree", size), size, |b, &size| {
            b.iter_with_setup(
                || QuadTree::new(root, 8),
                |tree| {
                    for i in 0..size {
                        tree.insert(grid_envelope(i), i);
                    }
                    black_box(tree.size())
                },
            );
        });
        group.bench_with_input(BenchmarkId::new("rtree", size), size, |b, &size| {
            b.iter_with_setup(
                || RTree::new(root, 16),
                |tree| {
                    for i in 0..size {
                        tree.insert(grid_envelope(i), i);
                    }
                    black_box(tree.size())
                },
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Index Search");
    let root = Envelope::new(0.0, 0.0, 101.0, 101.0);
    let query = Envelope::new(25.0, 25.0, 75.0, 75.0);

    let quadtree = QuadTree::new(root, 8);
    let rtree = RTree::new(root, 16);
    for i in 0..10000 {
        quadtree.insert(grid_envelope(i), i);
        rtree.insert(grid_envelope(i), i);
    }
    let packed = RTree::bulk_load(
        root,
        16,
        (0..10000).map(|i| SpatialIndexEntry::new(grid_envelope(i), i)),
    );

    group.bench_function("quadtree_10k", |b| b.iter(|| black_box(quadtree.query(&query))));
    group.bench_function("rtree_10k", |b| b.iter(|| black_box(rtree.query(&query))));
    group.bench_function("rtree_bulk_10k", |b| b.iter(|| black_box(packed.query(&query))));

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
