//! Aggregation of raw health records into daily and weekly metrics
//!
//! Every function here is pure and total: empty input produces the zero value
//! of the metric, never an error. Records are matched against query windows
//! by interval intersection, while workout calories and distance only count
//! records fully contained in the exercise session.

use chrono::{DateTime, Datelike, Days, Duration, NaiveTime, TimeZone, Utc};

use crate::config::SleepStageSplit;
use crate::models::{
    BodyMeasurements, CaloriesRecord, DailyMetrics, DistanceRecord, ExerciseSessionRecord,
    FloorsRecord, HeightRecord, HydrationRecord, RecordBatch, SleepSessionRecord,
    SleepStageBreakdown, StepsRecord, TimeWindow, WeeklyWorkoutSummary, WeightRecord,
    WorkoutRecord,
};

/// Label used when an exercise type is missing or unreadable
pub const OTHER_WORKOUT_TYPE: &str = "Other";

/// Total sleep and the estimated stage split
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SleepSummary {
    pub hours: f64,
    pub stages: SleepStageBreakdown,
}

/// Round half away from zero to a fixed number of decimals
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn sum_steps(records: &[StepsRecord], window: &TimeWindow) -> u64 {
    records
        .iter()
        .filter(|r| window.intersects(r.start_time, r.end_time))
        .map(|r| r.count)
        .fold(0u64, u64::saturating_add)
}

/// Total distance in meters
pub fn sum_distance(records: &[DistanceRecord], window: &TimeWindow) -> f64 {
    records
        .iter()
        .filter(|r| window.intersects(r.start_time, r.end_time))
        .map(|r| r.meters.max(0.0))
        .sum()
}

pub fn sum_floors(records: &[FloorsRecord], window: &TimeWindow) -> u32 {
    records
        .iter()
        .filter(|r| window.intersects(r.start_time, r.end_time))
        .map(|r| r.floors)
        .fold(0u32, u32::saturating_add)
}

/// Active kilocalories in the window, rounded to a whole number
pub fn sum_active_calories(records: &[CaloriesRecord], window: &TimeWindow) -> u32 {
    let total: f64 = records
        .iter()
        .filter(|r| window.intersects(r.start_time, r.end_time))
        .map(|r| r.kilocalories.max(0.0))
        .sum();
    total.round() as u32
}

/// Water intake in milliliters
pub fn sum_hydration(records: &[HydrationRecord], window: &TimeWindow) -> f64 {
    records
        .iter()
        .filter(|r| window.intersects(r.start_time, r.end_time))
        .map(|r| r.milliliters.max(0.0))
        .sum()
}

fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    ((end - start).num_milliseconds().max(0) as f64) / 3_600_000.0
}

/// Sum session durations and split each one proportionally into stages.
///
/// Sessions are taken as given; callers filter them to the query window.
pub fn aggregate_sleep(sessions: &[SleepSessionRecord], split: &SleepStageSplit) -> SleepSummary {
    sessions
        .iter()
        .fold(SleepSummary::default(), |mut summary, session| {
            let hours = duration_hours(session.start_time, session.end_time);
            summary.hours += hours;
            summary.stages.rem += hours * split.rem;
            summary.stages.deep += hours * split.deep;
            summary.stages.light += hours * split.light;
            summary.stages.awake += hours * split.awake;
            summary
        })
}

/// Turn a platform exercise type into a display label.
///
/// `STRENGTH_TRAINING` becomes `Strength training`, `weightTraining` becomes
/// `Weight Training`. Input without any letters maps to [`OTHER_WORKOUT_TYPE`].
pub fn normalize_workout_type(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        Some(r) if r.chars().any(char::is_alphabetic) => r,
        _ => return OTHER_WORKOUT_TYPE.to_string(),
    };

    // SCREAMING_CASE would otherwise get a space before every letter
    let source = if raw.chars().any(char::is_lowercase) {
        raw.to_string()
    } else {
        raw.to_lowercase()
    };

    let mut spaced = String::with_capacity(source.len() + 4);
    let mut prev: Option<char> = None;
    for c in source.chars() {
        if c == '_' {
            spaced.push(' ');
        } else {
            if c.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                spaced.push(' ');
            }
            spaced.push(c);
        }
        prev = Some(c);
    }

    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => OTHER_WORKOUT_TYPE.to_string(),
    }
}

/// Join an exercise session with the calorie and distance records inside it
pub fn build_workout_record(
    session: &ExerciseSessionRecord,
    calories: &[CaloriesRecord],
    distances: &[DistanceRecord],
) -> WorkoutRecord {
    let span = TimeWindow::new(session.start_time, session.end_time);

    let elapsed_ms = (session.end_time - session.start_time).num_milliseconds().max(0);
    let duration_minutes = (elapsed_ms as f64 / 60_000.0).round() as u32;

    let calories_burned = calories
        .iter()
        .filter(|r| span.encloses(r.start_time, r.end_time))
        .map(|r| r.kilocalories.max(0.0))
        .sum::<f64>()
        .round() as u32;

    let matching_distance: Vec<f64> = distances
        .iter()
        .filter(|r| span.encloses(r.start_time, r.end_time))
        .map(|r| r.meters.max(0.0))
        .collect();
    let distance_km = if matching_distance.is_empty() {
        None
    } else {
        Some(round_to(matching_distance.iter().sum::<f64>() / 1000.0, 2))
    };

    let workout_type = normalize_workout_type(session.exercise_type.as_deref());
    let name = session
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| workout_type.clone());

    WorkoutRecord {
        id: session.id.clone(),
        name,
        workout_type,
        start_time: session.start_time,
        end_time: session.end_time,
        duration_minutes,
        calories_burned,
        distance_km,
    }
}

/// Most recent Sunday at local midnight, in the reference's time zone
pub fn week_start<Tz: TimeZone>(reference: &DateTime<Tz>) -> DateTime<Tz> {
    let local = reference.naive_local();
    let back = u64::from(local.weekday().num_days_from_sunday());
    let sunday = local.date().checked_sub_days(Days::new(back)).unwrap_or(local.date());
    let midnight = sunday.and_time(NaiveTime::MIN);

    let tz = reference.timezone();
    tz.from_local_datetime(&midnight)
        .earliest()
        // Midnight can fall inside a DST gap
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

/// Totals of the workouts that started between the week start and `reference`
pub fn compute_weekly_summary<Tz: TimeZone>(
    workouts: &[WorkoutRecord],
    reference: &DateTime<Tz>,
) -> WeeklyWorkoutSummary {
    let start = week_start(reference).with_timezone(&Utc);
    let end = reference.with_timezone(&Utc);

    workouts
        .iter()
        .filter(|w| w.start_time >= start && w.start_time <= end)
        .fold(WeeklyWorkoutSummary::default(), |mut summary, w| {
            summary.total_workouts = summary.total_workouts.saturating_add(1);
            summary.total_minutes = summary.total_minutes.saturating_add(w.duration_minutes);
            summary.total_calories = summary.total_calories.saturating_add(w.calories_burned);
            summary
        })
}

/// Latest height and weight measurements, independently
pub fn latest_body_measurements(
    heights: &[HeightRecord],
    weights: &[WeightRecord],
) -> BodyMeasurements {
    BodyMeasurements {
        height_meters: heights
            .iter()
            .filter(|h| h.meters > 0.0)
            .max_by_key(|h| h.time)
            .map(|h| h.meters),
        weight_kg: weights
            .iter()
            .filter(|w| w.kilograms > 0.0)
            .max_by_key(|w| w.time)
            .map(|w| w.kilograms),
    }
}

/// Build the day's metrics from already fetched records
pub fn aggregate_day(
    window: &TimeWindow,
    batch: &RecordBatch,
    split: &SleepStageSplit,
) -> DailyMetrics {
    let sessions: Vec<SleepSessionRecord> = batch
        .sleep
        .iter()
        .filter(|s| window.intersects(s.start_time, s.end_time))
        .cloned()
        .collect();
    let sleep = aggregate_sleep(&sessions, split);

    DailyMetrics {
        steps: sum_steps(&batch.steps, window),
        distance_meters: sum_distance(&batch.distance, window),
        floors: sum_floors(&batch.floors, window),
        sleep_hours: sleep.hours,
        sleep_stages: sleep.stages,
        calories_burned: sum_active_calories(&batch.calories, window),
    }
}
