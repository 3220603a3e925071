use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use fitfusion::error::{FitFusionError, SourceError};
use fitfusion::models::{
    CaloriesRecord, DistanceRecord, ExerciseSessionRecord, HealthRecord, HydrationRecord,
    RecordKind, StepsRecord, TimeWindow,
};
use fitfusion::{AppConfig, HealthDataSource, HealthSession, InMemorySource, RefreshQuery};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

/// Refresh ordering, partial failure and nested workout lookups

fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
}

fn query() -> RefreshQuery {
    RefreshQuery::day_of(utc(18, 20, 0).with_timezone(&FixedOffset::east_opt(0).unwrap()))
}

fn sample_records() -> Vec<HealthRecord> {
    let mut records = vec![
        HealthRecord::Steps(StepsRecord {
            start_time: utc(18, 8, 0),
            end_time: utc(18, 9, 0),
            count: 6000,
        }),
        HealthRecord::Distance(DistanceRecord {
            start_time: utc(18, 8, 0),
            end_time: utc(18, 9, 0),
            meters: 4100.0,
        }),
    ];

    for i in 0..3u32 {
        let start = utc(18, 10 + i * 2, 0);
        records.push(HealthRecord::ExerciseSession(ExerciseSessionRecord {
            id: format!("run-{}", i),
            start_time: start,
            end_time: start + Duration::minutes(40),
            title: Some(format!("Run {}", i)),
            exercise_type: Some("RUNNING".to_string()),
        }));
        records.push(HealthRecord::ActiveCaloriesBurned(CaloriesRecord {
            start_time: start,
            end_time: start + Duration::minutes(40),
            kilocalories: 300.0,
        }));
        records.push(HealthRecord::Distance(DistanceRecord {
            start_time: start,
            end_time: start + Duration::minutes(40),
            meters: 5000.0,
        }));
    }

    records
}

/// Delays the first `slow_reads` step reads
struct SlowFirstSource {
    inner: InMemorySource,
    slow_reads: AtomicUsize,
    delay: StdDuration,
}

#[async_trait]
impl HealthDataSource for SlowFirstSource {
    async fn read_records(
        &self,
        kind: RecordKind,
        window: TimeWindow,
    ) -> Result<Vec<HealthRecord>, SourceError> {
        if kind == RecordKind::Steps {
            let slow = self
                .slow_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if slow {
                tokio::time::sleep(self.delay).await;
            }
        }
        self.inner.read_records(kind, window).await
    }

    async fn insert_hydration(&self, record: HydrationRecord) -> Result<(), SourceError> {
        self.inner.insert_hydration(record).await
    }
}

/// Tracks how many workout lookups are in flight at once
struct CountingSource {
    inner: InMemorySource,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl HealthDataSource for CountingSource {
    async fn read_records(
        &self,
        kind: RecordKind,
        window: TimeWindow,
    ) -> Result<Vec<HealthRecord>, SourceError> {
        // Only per-workout lookups use windows this short
        if window.end - window.start > Duration::hours(1) {
            return self.inner.read_records(kind, window).await;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.read_records(kind, window).await
    }

    async fn insert_hydration(&self, record: HydrationRecord) -> Result<(), SourceError> {
        self.inner.insert_hydration(record).await
    }
}

#[tokio::test]
async fn test_stale_refresh_does_not_overwrite_newer() {
    let source = SlowFirstSource {
        inner: InMemorySource::new(sample_records()),
        slow_reads: AtomicUsize::new(1),
        delay: StdDuration::from_millis(200),
    };
    let session = HealthSession::new(source, &AppConfig::default());

    // The first refresh starts first but finishes last
    let (slow, fast) = tokio::join!(session.refresh(query()), session.refresh(query()));

    assert_eq!(slow.sequence, 1);
    assert_eq!(fast.sequence, 2);
    assert!(fast.applied);
    assert!(!slow.applied);

    let latest = session.latest().await.unwrap();
    assert_eq!(latest.sequence, 2);
}

#[tokio::test]
async fn test_sequential_refreshes_publish_latest() {
    let session = HealthSession::new(InMemorySource::new(sample_records()), &AppConfig::default());
    assert!(session.latest().await.is_none());

    let first = session.refresh(query()).await;
    let second = session.refresh(query()).await;

    assert!(first.applied && second.applied);
    assert!(second.sequence > first.sequence);
    assert_eq!(session.latest().await.unwrap().sequence, second.sequence);
}

#[tokio::test]
async fn test_failing_kind_contributes_zero() {
    let source = InMemorySource::new(sample_records())
        .with_failing_kind(RecordKind::Steps, "permission revoked");
    let session = HealthSession::new(source, &AppConfig::default());

    let snapshot = session.refresh(query()).await.snapshot;

    assert_eq!(snapshot.daily.steps, 0);
    assert_eq!(snapshot.failed_kinds, vec![RecordKind::Steps]);
    assert_eq!(snapshot.daily.distance_meters, 4100.0 + 3.0 * 5000.0);
    assert_eq!(snapshot.workouts.len(), 3);
    assert_eq!(snapshot.weekly.total_calories, 900);
}

#[tokio::test]
async fn test_failing_nested_lookup_degrades_workouts() {
    let source = InMemorySource::new(sample_records())
        .with_failing_kind(RecordKind::Distance, "sensor offline");
    let session = HealthSession::new(source, &AppConfig::default());

    let snapshot = session.refresh(query()).await.snapshot;

    // Reported once even though every workout lookup failed
    assert_eq!(snapshot.failed_kinds, vec![RecordKind::Distance]);
    assert_eq!(snapshot.daily.distance_meters, 0.0);
    assert_eq!(snapshot.workouts.len(), 3);
    for workout in &snapshot.workouts {
        assert_eq!(workout.distance_km, None);
        assert_eq!(workout.calories_burned, 300);
    }
}

#[tokio::test]
async fn test_workout_lookups_run_concurrently() {
    let source = CountingSource {
        inner: InMemorySource::new(sample_records()),
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    };
    let session = HealthSession::new(source, &AppConfig::default());

    let snapshot = session.refresh(query()).await.snapshot;

    assert_eq!(snapshot.workouts.len(), 3);
    assert!(snapshot.workouts.iter().all(|w| w.distance_km == Some(5.0)));
    assert!(session.source().max_in_flight.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_water_write_failure_is_reported() {
    let source = InMemorySource::default().with_failing_kind(RecordKind::Hydration, "read only");
    let session = HealthSession::new(source, &AppConfig::default());

    let err = session
        .log_water_intake(250.0, utc(18, 9, 0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FitFusionError::Source(SourceError::WriteFailed {
            kind: RecordKind::Hydration,
            ..
        })
    ));
}
