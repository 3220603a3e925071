//! Refresh cycle: fetch, aggregate, publish
//!
//! A refresh reads every record kind concurrently, then looks up the calories
//! and distance for each exercise session concurrently. A kind that fails
//! contributes nothing and is reported in the snapshot instead of failing the
//! refresh. Each refresh takes a sequence number when it starts, and a
//! finished refresh only replaces the published snapshot if no later-started
//! refresh has already published.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, TimeZone, Utc};
use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::aggregator::{
    aggregate_day, build_workout_record, compute_weekly_summary, latest_body_measurements,
    sum_hydration,
};
use crate::config::{AppConfig, FetchSettings, ProfileOverrides, SleepStageSplit};
use crate::error::{FitFusionError, Result, SourceError};
use crate::models::{
    CaloriesRecord, DistanceRecord, ExerciseSessionRecord, HealthRecord, HealthSnapshot,
    HydrationRecord, RecordBatch, RecordKind, TimeWindow, WorkoutRecord,
};
use crate::source::HealthDataSource;

/// The week summary always needs at least the current week of workouts
const MIN_WORKOUT_LOOKBACK_DAYS: u32 = 7;

/// What a refresh covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshQuery {
    /// Local calendar day, as UTC instants
    pub window: TimeWindow,

    /// "Now" in the user's local time; bounds the weekly summary
    pub reference: DateTime<FixedOffset>,
}

impl RefreshQuery {
    /// The local calendar day containing `reference`
    pub fn day_of(reference: DateTime<FixedOffset>) -> Self {
        let midnight = reference.date_naive().and_time(NaiveTime::MIN);
        let offset = Duration::seconds(i64::from(reference.offset().local_minus_utc()));
        let start = Utc.from_utc_datetime(&(midnight - offset));

        RefreshQuery {
            window: TimeWindow::new(start, start + Duration::days(1)),
            reference,
        }
    }

    /// Today in the system's local time zone
    pub fn today() -> Self {
        let now = Local::now();
        Self::day_of(now.with_timezone(now.offset()))
    }
}

/// Outcome of one refresh
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub sequence: u64,

    /// False when a later refresh had already published
    pub applied: bool,

    pub snapshot: Arc<HealthSnapshot>,
}

/// Holds the latest published snapshot for one user session
pub struct HealthSession<S: HealthDataSource> {
    source: S,
    split: SleepStageSplit,
    fetch: FetchSettings,
    overrides: ProfileOverrides,
    next_sequence: AtomicU64,
    latest: RwLock<Option<Arc<HealthSnapshot>>>,
}

impl<S: HealthDataSource> HealthSession<S> {
    pub fn new(source: S, config: &AppConfig) -> Self {
        HealthSession {
            source,
            split: config.sleep_split,
            fetch: config.fetch.clone(),
            overrides: config.profile,
            next_sequence: AtomicU64::new(0),
            latest: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Last published snapshot, if any refresh has completed
    pub async fn latest(&self) -> Option<Arc<HealthSnapshot>> {
        self.latest.read().await.clone()
    }

    async fn read(
        &self,
        kind: RecordKind,
        window: TimeWindow,
    ) -> std::result::Result<Vec<HealthRecord>, SourceError> {
        self.source.read_records(kind, window).await
    }

    /// Fetch, aggregate and publish.
    ///
    /// Never fails: unavailable kinds degrade to zero values and are listed in
    /// `HealthSnapshot::failed_kinds`.
    #[instrument(skip(self), fields(day = %query.window.start))]
    pub async fn refresh(&self, query: RefreshQuery) -> RefreshReport {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(sequence, "Refresh started");

        let day = query.window;
        let body_window = TimeWindow::new(
            day.end - Duration::days(i64::from(self.fetch.body_lookback_days)),
            day.end,
        );
        let workout_days = self.fetch.workout_lookback_days.max(MIN_WORKOUT_LOOKBACK_DAYS);
        let workout_window = TimeWindow::new(
            day.end - Duration::days(i64::from(workout_days)),
            day.end.max(query.reference.with_timezone(&Utc)),
        );

        let (steps, distance, floors, sleep, calories, hydration, height, weight, exercise) = tokio::join!(
            self.read(RecordKind::Steps, day),
            self.read(RecordKind::Distance, day),
            self.read(RecordKind::FloorsClimbed, day),
            self.read(RecordKind::SleepSession, day),
            self.read(RecordKind::ActiveCaloriesBurned, day),
            self.read(RecordKind::Hydration, day),
            self.read(RecordKind::Height, body_window),
            self.read(RecordKind::Weight, body_window),
            self.read(RecordKind::ExerciseSession, workout_window),
        );

        let mut failed_kinds = Vec::new();
        let mut batch = RecordBatch::default();
        for result in [
            steps, distance, floors, sleep, calories, hydration, height, weight, exercise,
        ] {
            match result {
                Ok(records) => batch.extend(records),
                Err(e) => {
                    failed_kinds.push(e.kind());
                    FitFusionError::from(e).log("Record fetch failed, using zero value");
                }
            }
        }

        let loaded = join_all(batch.exercise.iter().map(|s| self.load_workout(s))).await;
        let mut workouts = Vec::with_capacity(loaded.len());
        for (workout, failures) in loaded {
            workouts.push(workout);
            failed_kinds.extend(failures);
        }
        workouts.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        failed_kinds.sort_by_key(|k| RecordKind::ALL.iter().position(|x| x == k));
        failed_kinds.dedup();

        let daily = aggregate_day(&day, &batch, &self.split);
        let body = self
            .overrides
            .apply(latest_body_measurements(&batch.height, &batch.weight));
        let weekly = compute_weekly_summary(&workouts, &query.reference);

        let snapshot = Arc::new(HealthSnapshot {
            sequence,
            window: day,
            daily,
            body,
            hydration_ml: sum_hydration(&batch.hydration, &day),
            workouts,
            weekly,
            failed_kinds,
            fetched_at: Utc::now(),
            utc_offset_seconds: query.reference.offset().local_minus_utc(),
        });

        let applied = self.publish(Arc::clone(&snapshot)).await;
        info!(
            sequence,
            applied,
            steps = snapshot.daily.steps,
            workouts = snapshot.workouts.len(),
            failed = snapshot.failed_kinds.len(),
            "Refresh completed"
        );

        RefreshReport {
            sequence,
            applied,
            snapshot,
        }
    }

    /// Replace the published snapshot unless a newer one is already there
    async fn publish(&self, snapshot: Arc<HealthSnapshot>) -> bool {
        let mut latest = self.latest.write().await;
        match latest.as_ref() {
            Some(current) if current.sequence > snapshot.sequence => {
                debug!(
                    stale = snapshot.sequence,
                    current = current.sequence,
                    "Discarding stale refresh"
                );
                false
            }
            _ => {
                *latest = Some(snapshot);
                true
            }
        }
    }

    /// Nested lookups for one exercise session; failures fall back to defaults
    async fn load_workout(&self, session: &ExerciseSessionRecord) -> (WorkoutRecord, Vec<RecordKind>) {
        let span = TimeWindow::new(session.start_time, session.end_time);
        let (calories, distance) = tokio::join!(
            self.read(RecordKind::ActiveCaloriesBurned, span),
            self.read(RecordKind::Distance, span),
        );

        let mut failures = Vec::new();
        let calories: Vec<CaloriesRecord> = match calories {
            Ok(records) => RecordBatch::from_records(records).calories,
            Err(e) => {
                failures.push(e.kind());
                FitFusionError::from(e)
                    .log(&format!("Calorie lookup for workout {} failed", session.id));
                Vec::new()
            }
        };
        let distance: Vec<DistanceRecord> = match distance {
            Ok(records) => RecordBatch::from_records(records).distance,
            Err(e) => {
                failures.push(e.kind());
                FitFusionError::from(e)
                    .log(&format!("Distance lookup for workout {} failed", session.id));
                Vec::new()
            }
        };

        (build_workout_record(session, &calories, &distance), failures)
    }

    /// Record a glass of water
    #[instrument(skip(self))]
    pub async fn log_water_intake(&self, milliliters: f64, at: DateTime<Utc>) -> Result<()> {
        if !milliliters.is_finite() || milliliters <= 0.0 {
            return Err(FitFusionError::Validation(format!(
                "water intake must be a positive amount, got {}",
                milliliters
            )));
        }

        self.source
            .insert_hydration(HydrationRecord {
                id: None,
                start_time: at,
                end_time: at,
                milliliters,
            })
            .await?;

        info!(milliliters, "Water intake logged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_uses_local_midnight() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let reference = offset.with_ymd_and_hms(2026, 10, 18, 21, 30, 0).unwrap();

        let query = RefreshQuery::day_of(reference);
        assert_eq!(
            query.window.start,
            Utc.with_ymd_and_hms(2026, 10, 18, 5, 0, 0).unwrap()
        );
        assert_eq!(
            query.window.end,
            Utc.with_ymd_and_hms(2026, 10, 19, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_today_covers_now() {
        let query = RefreshQuery::today();
        assert!(query.window.contains(Utc::now()) || query.window.end <= Utc::now());
        assert_eq!(query.window.end - query.window.start, Duration::days(1));
    }
}
