//! Simulator and ledger benchmarks (Criterion).
//!
//! Run: `cargo bench` or `cargo bench --bench engine`.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use dire_exchange_sim::catalog::default_catalog;
use dire_exchange_sim::store::Collections;
use dire_exchange_sim::ledger::{apply_buy, apply_sell};
use dire_exchange_sim::{
    events, Account, Ledger, LockRegistry, Matcher, MemoryStore, PriceWalk, Simulator, SimulatorConfig, Store,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn bench_price_walk(c: &mut Criterion) {
    const N: usize = 1000;
    let mut group = c.benchmark_group("simulation");
    group.throughput(Throughput::Elements(N as u64));
    group.bench_function("walk_step_1000", |b| {
        b.iter_batched(
            || {
                PriceWalk::new(&SimulatorConfig {
                    seed: Some(42),
                    ..Default::default()
                })
            },
            |mut walk| {
                let mut price = Decimal::from(150);
                for _ in 0..N {
                    price = walk.step(price);
                }
                price
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_ledger_round_trip(c: &mut Criterion) {
    const N: usize = 1000;
    let mut group = c.benchmark_group("ledger");
    group.throughput(Throughput::Elements(2 * N as u64));
    group.bench_function("buy_sell_1000", |b| {
        b.iter_batched(
            || Account::new("bench", "h", Decimal::from(1_000_000)),
            |mut account| {
                let price = Decimal::new(15012, 2);
                for _ in 0..N {
                    apply_buy(&mut account, "AAPL", 3, price).unwrap();
                    apply_sell(&mut account, "AAPL", 3, price).unwrap();
                }
                account
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_simulator_tick(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("simulation");
    group.throughput(Throughput::Elements(default_catalog().len() as u64));
    group.bench_function("tick_12_instruments", |b| {
        b.to_async(&runtime).iter_batched(
            || {
                // setup runs inside the bench runtime, so seed without awaiting
                let store: Arc<dyn Store> = Arc::new(MemoryStore::from_collections(Collections {
                    prices: default_catalog(),
                    ..Default::default()
                }));
                let matcher = Matcher::new(Ledger::new(store.clone(), Arc::new(LockRegistry::new())));
                let (tx, _) = events::channel();
                Simulator::new(
                    SimulatorConfig {
                        seed: Some(7),
                        ..Default::default()
                    },
                    store,
                    matcher,
                    tx,
                )
            },
            |mut sim| async move { sim.tick().await.unwrap() },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_price_walk, bench_ledger_round_trip, bench_simulator_tick);
criterion_main!(benches);
