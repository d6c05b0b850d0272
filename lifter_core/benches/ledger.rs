use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use lifter_core::{DutyCycleLedger, DutyCyclePolicy, UsageInterval};

const NOW: f64 = 1_700_000_000.0;

// Back-to-back short bursts filling the window, the worst case a real
// controller can produce.
fn dense_history(n: usize) -> Vec<UsageInterval> {
    let step = 1200.0 / n as f64;
    (0..n)
        .map(|i| {
            let start = NOW - 1200.0 + i as f64 * step;
            UsageInterval::new(start, start + step * 0.1).unwrap_or_else(|e| panic!("{e}"))
        })
        .collect()
}

pub fn bench_usage(c: &mut Criterion) {
    let mut g = c.benchmark_group("ledger");
    for n in [16usize, 256, 4096] {
        let history = dense_history(n);
        g.bench_function(format!("current_usage_{n}"), |b| {
            b.iter_batched(
                || DutyCycleLedger::with_intervals(DutyCyclePolicy::default(), history.clone()),
                |mut l| black_box(l.current_usage(black_box(NOW))),
                BatchSize::SmallInput,
            )
        });
        g.bench_function(format!("time_until_available_{n}"), |b| {
            b.iter_batched(
                || DutyCycleLedger::with_intervals(DutyCyclePolicy::default(), history.clone()),
                |mut l| black_box(l.time_until_available(black_box(NOW), 30.0)),
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(benches, bench_usage);
criterion_main!(benches);
