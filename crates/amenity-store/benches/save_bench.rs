//! Save path benchmarks

use std::collections::BTreeMap;

use amenity_store::{flatten, AmenitiesByRoom, AmenitySchema, AmenityStore, StoreConfig};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn amenities(i: usize, growing: bool) -> AmenitiesByRoom {
    let mut by_room = AmenitiesByRoom::new();
    let kitchen: BTreeMap<String, bool> = ["sink", "oven", "refrigerator"]
        .iter()
        .enumerate()
        .map(|(j, a)| ((*a).to_string(), (i + j) % 2 == 0))
        .collect();
    by_room.insert("kitchen".into(), kitchen);
    if growing {
        by_room
            .entry(format!("room{i}"))
            .or_default()
            .insert("extra".into(), true);
    }
    by_room
}

fn bench_save(c: &mut Criterion, name: &str, growing: bool) {
    c.bench_function(name, |b| {
        b.iter_batched(
            || {
                let dir = tempfile::tempdir().unwrap();
                let store =
                    AmenityStore::initialize(StoreConfig::new(dir.path()), AmenitySchema::standard())
                        .unwrap();
                (dir, store)
            },
            |(dir, store)| {
                for i in 0..20 {
                    let by_room = amenities(i, growing);
                    store
                        .save(&format!("img{i}.jpg"), &by_room, "bench", &flatten(&by_room))
                        .unwrap();
                }
                black_box(store.summary());
                drop(dir);
            },
            BatchSize::PerIteration,
        );
    });
}

fn bench_save_stable_schema(c: &mut Criterion) {
    bench_save(c, "save_20_stable_schema", false);
}

fn bench_save_growing_schema(c: &mut Criterion) {
    bench_save(c, "save_20_growing_schema", true);
}

fn bench_all_results(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store =
        AmenityStore::initialize(StoreConfig::new(dir.path()), AmenitySchema::standard()).unwrap();
    for i in 0..200 {
        let by_room = amenities(i, false);
        store
            .save(&format!("img{i}.jpg"), &by_room, "bench", &flatten(&by_room))
            .unwrap();
    }

    c.bench_function("all_results_200_rows", |b| {
        b.iter(|| black_box(store.all_results()));
    });
}

criterion_group!(
    benches,
    bench_save_stable_schema,
    bench_save_growing_schema,
    bench_all_results
);
criterion_main!(benches);
