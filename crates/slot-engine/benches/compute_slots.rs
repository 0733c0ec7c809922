#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use slot_engine::{SlotEngine, SlotRequest, Timeline, Timelines};

fn week_of_timelines(attendees: usize) -> (Timelines, Vec<String>) {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
    let codes = ["0", "0", "1", "0", "2", "0", "0", "3"];

    let mut timelines = Timelines::new();
    let mut names = Vec::with_capacity(attendees);
    for a in 0..attendees {
        let name = format!("attendee{a}@example.com");
        let pattern: String = (0..7 * 48)
            .map(|i| codes[(i + a) % codes.len()])
            .collect();
        timelines.insert(
            name.clone(),
            Timeline::from_codes(start, 30, &pattern).unwrap(),
        );
        names.push(name);
    }
    (timelines, names)
}

fn compute_slots(c: &mut Criterion) {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
    let engine = SlotEngine::default();

    c.bench_function("week_10_attendees_quorum_60", |b| {
        let (timelines, names) = week_of_timelines(10);
        let request = SlotRequest::new(names, start, start + Duration::days(7), 60)
            .min_percentage_free(60);
        b.iter(|| black_box(engine.compute_slots(&timelines, &request)));
    });

    c.bench_function("week_50_attendees_working_hours", |b| {
        let (timelines, names) = week_of_timelines(50);
        let request = SlotRequest::new(names, start, start + Duration::days(7), 90)
            .working_hours_only(true)
            .min_percentage_free(50);
        b.iter(|| black_box(engine.compute_slots(&timelines, &request)));
    });
}

criterion_group!(benches, compute_slots);
criterion_main!(benches);
