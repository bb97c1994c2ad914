//! Criterion benchmarks for the per-entry hot paths.
//!
//! Run with: `cargo bench --bench targets`

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sigtrack::stats::{OutcomeTotals, StatsReport};
use sigtrack::targets::{TargetCalculator, TargetConfig};
use sigtrack::types::{Direction, ExitReason, SignalEntry, TrackedSignal};

/// Target computation across the confidence range
fn bench_compute_targets(c: &mut Criterion) {
    let calc = TargetCalculator::new(TargetConfig::default());
    let mut group = c.benchmark_group("compute_targets");

    for confidence in [0.0, 50.0, 100.0].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(confidence),
            confidence,
            |b, &conf| {
                b.iter(|| {
                    let _ = calc.compute(
                        black_box(43_250.0),
                        black_box(Direction::Long),
                        black_box(conf),
                        black_box(0.018),
                    );
                });
            },
        );
    }

    group.finish();
}

/// Synthetic resolved history, alternating wins and losses
fn history(count: usize) -> Vec<TrackedSignal> {
    let calc = TargetCalculator::default();
    (0..count)
        .map(|i| {
            let entry = SignalEntry {
                id: format!("sig-{}", i),
                symbol: if i % 2 == 0 { "BTCUSDT" } else { "ETHUSDT" }.to_string(),
                direction: Direction::Long,
                entry_price: 100.0,
                confidence: 70.0,
                volatility: 0.02,
            };
            let targets = calc
                .compute(100.0, Direction::Long, 70.0, 0.02)
                .expect("valid bench input");
            let mut signal = TrackedSignal::new(&entry, targets, Utc::now());
            if i % 3 == 0 {
                signal.observe(98.0);
                signal.settle(98.0, ExitReason::StopLoss, Utc::now());
            } else {
                signal.observe(101.0);
                signal.settle(101.0, ExitReason::Tp1, Utc::now());
            }
            signal
        })
        .collect()
}

/// Full stats report over retained history
fn bench_stats_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_report");

    for size in [100, 1000, 10000].iter() {
        let signals = history(*size);
        let totals = OutcomeTotals::from_history(&signals);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let _ = StatsReport::build(black_box(&totals), black_box(&signals), 0);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compute_targets, bench_stats_report);
criterion_main!(benches);
