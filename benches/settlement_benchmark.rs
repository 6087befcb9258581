use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ledger_engine::prelude::*;
use rust_decimal::Decimal;

/// A world with `households` customers split across two banks, each owing a
/// counterparty a payable due on day 0.
fn populated_world(households: usize) -> Ledger {
    let cb = Agent::new("CB", "Central Bank", AgentKind::CentralBank);
    let mut ledger = Ledger::new(cb, Denomination::new("USD"), PolicyTable::default()).unwrap();
    ledger
        .add_agent(Agent::new("B1", "Bank One", AgentKind::Bank))
        .unwrap();
    ledger
        .add_agent(Agent::new("B2", "Bank Two", AgentKind::Bank))
        .unwrap();
    ledger
        .mint_reserves(&AgentId::new("B1"), Decimal::from(1_000_000))
        .unwrap();
    ledger
        .mint_reserves(&AgentId::new("B2"), Decimal::from(1_000_000))
        .unwrap();

    let ids: Vec<AgentId> = (0..households)
        .map(|n| AgentId::new(format!("H{:04}", n)))
        .collect();
    for (n, hid) in ids.iter().enumerate() {
        ledger
            .add_agent(Agent::new(
                hid.as_str(),
                format!("Household {}", n),
                AgentKind::Household,
            ))
            .unwrap();
        let bank = AgentId::new(if n % 2 == 0 { "B1" } else { "B2" });
        ledger.mint_cash(hid, Decimal::from(10_000)).unwrap();
        ledger.deposit_cash(hid, &bank, Decimal::from(8_000)).unwrap();
    }
    for (n, hid) in ids.iter().enumerate() {
        let counterparty = &ids[(n + 1) % ids.len()];
        ledger
            .create_payable(hid, counterparty, Decimal::from(100 + (n % 7) * 50), Some(0))
            .unwrap();
    }
    ledger
}

fn bench_day_20_households(c: &mut Criterion) {
    c.bench_function("run_day_20_households", |b| {
        b.iter_batched(
            || populated_world(20),
            |mut ledger| run_day(black_box(&mut ledger)).unwrap(),
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_day_200_households(c: &mut Criterion) {
    c.bench_function("run_day_200_households", |b| {
        b.iter_batched(
            || populated_world(200),
            |mut ledger| run_day(black_box(&mut ledger)).unwrap(),
            criterion::BatchSize::LargeInput,
        )
    });
}

fn bench_compute_nets(c: &mut Criterion) {
    let mut ledger = populated_world(200);
    let day = ledger.day();
    settle_due(&mut ledger, day).unwrap();

    c.bench_function("compute_intraday_nets_200", |b| {
        b.iter(|| compute_intraday_nets(black_box(&ledger), day))
    });
}

criterion_group!(
    benches,
    bench_day_20_households,
    bench_day_200_households,
    bench_compute_nets
);
criterion_main!(benches);
