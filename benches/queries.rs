// Query benchmarks: full-store scans against the index fast paths on a
// hundred-thousand-object store, which is the scale the engine is expected
// to stay interactive at.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use saodb::{run_query, ObjectStore, QueryOptions, SaoBuilder};

const STORE_SIZE: usize = 100_000;

fn populated_store() -> ObjectStore {
    let type_pool = ["person", "employee", "server", "asset", "invoice"];
    let objects = (0..STORE_SIZE)
        .map(|i| {
            SaoBuilder::new()
                .id(format!("obj-{i}"))
                .source("bench")
                .object_type(type_pool[i % type_pool.len()])
                .field("rank", (i % 977) as i64)
                .build()
                .unwrap()
        })
        .collect();
    let store = ObjectStore::new();
    store.replace_provider("bench", objects);
    store
}

fn bench_query_operations(c: &mut Criterion) {
    let store = populated_store();
    let optimized = QueryOptions {
        optimize: true,
        profile: false,
    };
    let naive = QueryOptions {
        optimize: false,
        profile: false,
    };

    c.bench_function("type_filter_index_fast_path", |b| {
        b.iter(|| {
            let (value, _) =
                run_query(store.snapshot(), black_box("person.count()"), optimized).unwrap();
            black_box(value)
        })
    });

    c.bench_function("type_filter_naive_scan", |b| {
        b.iter(|| {
            let (value, _) =
                run_query(store.snapshot(), black_box("person.count()"), naive).unwrap();
            black_box(value)
        })
    });

    c.bench_function("id_lookup_index_fast_path", |b| {
        b.iter(|| {
            let (value, _) =
                run_query(store.snapshot(), black_box("#'obj-70071'"), optimized).unwrap();
            black_box(value)
        })
    });

    c.bench_function("predicate_filter_over_type_index", |b| {
        b.iter(|| {
            let (value, _) = run_query(
                store.snapshot(),
                black_box("person[.rank == 500].count()"),
                optimized,
            )
            .unwrap();
            black_box(value)
        })
    });

    c.bench_function("parse_only", |b| {
        b.iter(|| black_box(saodb::parse_query("person[.rank == 500]{.rank}.count()").unwrap()))
    });
}

criterion_group!(benches, bench_query_operations);
criterion_main!(benches);
