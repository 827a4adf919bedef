//! Goal ranking over a growing practice history.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use uuid::Uuid;

use kospeak::adapters::memory::InMemoryHistoryRepository;
use kospeak::{
    CoachingEngine, Config, ContextTag, Domain, GoalHistoryEntry, GoalOutcome, GoalRequest,
    ItemResponse, ItemType,
};

fn history(engine: &CoachingEngine<InMemoryHistoryRepository>, sessions: usize) -> Vec<GoalHistoryEntry> {
    let goals = engine.catalogs().active().goals();
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    (0..sessions)
        .flat_map(|s| {
            let session = Uuid::new_v4();
            (0..2).map(move |i| (s, session, i))
        })
        .map(|(s, session, i)| {
            GoalHistoryEntry::new(
                "bench",
                session,
                goals[(s * 2 + i) % goals.len()].id.clone(),
                if s % 3 == 0 { GoalOutcome::Succeeded } else { GoalOutcome::Partial },
                base + Duration::hours(s as i64),
            )
        })
        .collect()
}

fn bench_goal_selection(c: &mut Criterion) {
    let engine = CoachingEngine::new(&Config::default(), Arc::new(InMemoryHistoryRepository::new())).unwrap();
    let responses: Vec<ItemResponse> = Domain::ALL
        .into_iter()
        .map(|d| ItemResponse::new(d.as_str(), ItemType::MultipleChoice, d, 0.45))
        .collect();
    let profile = engine.compute_profile("bench", &responses).unwrap();
    let request = GoalRequest::new(ContextTag::School, 3);

    let mut group = c.benchmark_group("select_goals");
    for sessions in [0usize, 10, 100, 1000] {
        let entries = history(&engine, sessions);
        group.bench_with_input(BenchmarkId::from_parameter(sessions), &entries, |b, entries| {
            b.iter(|| engine.select_goals_or_open(black_box(&profile), black_box(&request), entries));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_goal_selection);
criterion_main!(benches);
