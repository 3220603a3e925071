use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fitfusion::aggregator::{aggregate_day, compute_weekly_summary, normalize_workout_type};
use fitfusion::config::SleepStageSplit;
use fitfusion::insights::build_health_context_summary;
use fitfusion::models::{
    BodyMeasurements, DistanceRecord, HealthRecord, RecordBatch, SleepSessionRecord, StepsRecord,
    TimeWindow, WorkoutRecord,
};

/// Aggregation benchmarks
///
/// A busy wearable writes step and distance samples every minute, so a day
/// can hold well over a thousand records per kind.

fn day() -> TimeWindow {
    let start = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();
    TimeWindow::new(start, start + Duration::days(1))
}

fn create_day_batch(samples: usize) -> RecordBatch {
    let window = day();
    let mut records = Vec::with_capacity(samples * 2 + 1);
    for i in 0..samples {
        let start = window.start + Duration::seconds((i as i64 * 86_400) / samples as i64);
        let end = start + Duration::seconds(30);
        records.push(HealthRecord::Steps(StepsRecord {
            start_time: start,
            end_time: end,
            count: 40 + (i % 60) as u64,
        }));
        records.push(HealthRecord::Distance(DistanceRecord {
            start_time: start,
            end_time: end,
            meters: 30.0 + (i % 25) as f64,
        }));
    }
    records.push(HealthRecord::SleepSession(SleepSessionRecord {
        start_time: window.start - Duration::hours(1),
        end_time: window.start + Duration::hours(7),
        title: None,
    }));
    RecordBatch::from_records(records)
}

fn create_workouts(count: usize) -> Vec<WorkoutRecord> {
    let base = Utc.with_ymd_and_hms(2026, 10, 18, 6, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let start = base - Duration::hours(i as i64 * 5);
            WorkoutRecord {
                id: format!("w{}", i),
                name: "Morning Run".to_string(),
                workout_type: "Running".to_string(),
                start_time: start,
                end_time: start + Duration::minutes(45),
                duration_minutes: 45,
                calories_burned: 350,
                distance_km: Some(7.5),
            }
        })
        .collect()
}

fn bench_aggregate_day(c: &mut Criterion) {
    let mut group = c.benchmark_group("Daily Aggregation");
    let split = SleepStageSplit::default();
    let window = day();

    for &samples in &[100, 1_440, 10_000] {
        let batch = create_day_batch(samples);

        group.throughput(Throughput::Elements(samples as u64 * 2));
        group.bench_with_input(BenchmarkId::new("aggregate_day", samples), &batch, |b, batch| {
            b.iter(|| aggregate_day(black_box(&window), black_box(batch), &split));
        });
    }

    group.finish();
}

fn bench_weekly_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("Weekly Summary");
    let reference: DateTime<FixedOffset> = Utc
        .with_ymd_and_hms(2026, 10, 18, 20, 0, 0)
        .unwrap()
        .with_timezone(&FixedOffset::east_opt(0).unwrap());

    for &count in &[10, 100, 1_000] {
        let workouts = create_workouts(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("compute_weekly_summary", count),
            &workouts,
            |b, workouts| {
                b.iter(|| compute_weekly_summary(black_box(workouts), &reference));
            },
        );
    }

    group.finish();
}

fn bench_context_and_normalization(c: &mut Criterion) {
    let batch = create_day_batch(1_440);
    let metrics = aggregate_day(&day(), &batch, &SleepStageSplit::default());
    let workouts = create_workouts(50);
    let reference = Utc.with_ymd_and_hms(2026, 10, 18, 20, 0, 0).unwrap();
    let weekly = compute_weekly_summary(&workouts, &reference);
    let body = BodyMeasurements {
        height_meters: Some(1.75),
        weight_kg: Some(70.0),
    };
    let offset = FixedOffset::west_opt(5 * 3600).unwrap();

    c.bench_function("build_health_context_summary", |b| {
        b.iter(|| {
            build_health_context_summary(black_box(&metrics), &body, &workouts, &weekly, &offset)
        });
    });

    c.bench_function("normalize_workout_type", |b| {
        b.iter(|| {
            for raw in ["STRENGTH_TRAINING", "weightTraining", "running", "HIIT", "123"] {
                black_box(normalize_workout_type(Some(raw)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_aggregate_day,
    bench_weekly_summary,
    bench_context_and_normalization
);
criterion_main!(benches);
