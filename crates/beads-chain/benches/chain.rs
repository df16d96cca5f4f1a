use beads_chain::{ChainRunner, ChainSpec, InsertBuffer, JoinSpec, LookupOptions, QuerySpec};
use beads_store::{Collection, MemoryStore, Store};
use bson::doc;
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

fn seeded_store(orders: i32) -> MemoryStore {
    let store = MemoryStore::new();
    let customers: Vec<_> = (0..orders / 10)
        .map(|i| doc! { "_id": i, "name": format!("customer-{i}"), "tier": i % 3 })
        .collect();
    let docs: Vec<_> = (0..orders)
        .map(|i| doc! { "_id": i, "customer_id": i % (orders / 10), "total": i * 7 })
        .collect();
    store.collection("customers").unwrap().insert_many(&customers).unwrap();
    store.collection("orders").unwrap().insert_many(&docs).unwrap();
    store
}

// ── Chain ───────────────────────────────────────────────────

fn bench_lookups(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain/lookups");
    for n in [1_000, 10_000] {
        let store = seeded_store(n);
        let spec = ChainSpec::builder("orders", QuerySpec::default())
            .join(
                JoinSpec::new("customers", "customer_id")
                    .with_options(LookupOptions::default().with_self_key("_id")),
            )
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let runner = ChainRunner::new(&store);
                let out: usize = runner
                    .lookups(&spec)
                    .unwrap()
                    .map(|batch| batch.unwrap().len())
                    .sum();
                assert_eq!(out, n as usize);
            })
        });
    }
    group.finish();
}

// ── Bulk ────────────────────────────────────────────────────

fn bench_bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain/bulk_insert");
    for n in [1_000, 10_000] {
        let docs: Vec<_> = (0..n).map(|i| doc! { "_id": i, "n": i }).collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || (MemoryStore::new(), docs.clone()),
                |(store, docs)| {
                    let mut buffer = InsertBuffer::new(store.collection("events").unwrap());
                    for doc in docs {
                        buffer.add(doc).unwrap();
                    }
                    buffer.close().unwrap();
                },
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookups, bench_bulk_insert);
criterion_main!(benches);
