use checkin_tally::models::{Ledger, ScoringSettings, Weights};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;

const NOW: &str = "2024-03-01T12:00:00Z";

fn roster(size: usize, offset: usize) -> (Vec<String>, Vec<String>) {
    let nicknames = (0..size).map(|i| format!("member{}", i + offset)).collect();
    let times = (0..size)
        .map(|i| format!("2024-03-01 08:{:02}:{:02}", (i / 60) % 60, i % 60))
        .collect();
    (nicknames, times)
}

/// A season's worth of files: 60 days with 300 check-ins each.
fn season() -> Ledger {
    let mut ledger = Ledger::default();
    for day in 0..60 {
        let (nicknames, times) = roster(300, day * 7);
        ledger
            .apply_file(
                &format!("day{day}.xlsx"),
                &nicknames,
                &times,
                &Weights::Uniform(1),
                &ScoringSettings::default(),
                NOW,
            )
            .expect("apply");
    }
    ledger
}

fn benchmark_ledger(c: &mut Criterion) {
    let ledger = season();
    let (nicknames, times) = roster(300, 13);
    let rewarded = ScoringSettings {
        reward_count: 10,
        ..Default::default()
    };

    let mut group = c.benchmark_group("ledger");

    group.bench_function("apply_new_file", |b| {
        b.iter_batched(
            || ledger.clone(),
            |mut ledger| {
                ledger
                    .apply_file(
                        "new.xlsx",
                        black_box(&nicknames),
                        black_box(&times),
                        &Weights::Uniform(2),
                        &rewarded,
                        NOW,
                    )
                    .expect("apply")
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("reweight_existing_file", |b| {
        b.iter_batched(
            || ledger.clone(),
            |mut ledger| {
                ledger
                    .reweight_file("day30.xlsx", black_box(&nicknames), black_box(&times), 3, NOW)
                    .expect("reweight")
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("leaderboard", |b| b.iter(|| black_box(&ledger).leaderboard()));

    group.finish();
}

criterion_group!(benches, benchmark_ledger);
criterion_main!(benches);
