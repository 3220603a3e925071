use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categories of health measurement served by a health data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Steps,
    Distance,
    FloorsClimbed,
    SleepSession,
    ExerciseSession,
    ActiveCaloriesBurned,
    Height,
    Weight,
    Hydration,
}

impl RecordKind {
    /// Every kind, in the order a refresh fetches them
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Steps,
        RecordKind::Distance,
        RecordKind::FloorsClimbed,
        RecordKind::SleepSession,
        RecordKind::ExerciseSession,
        RecordKind::ActiveCaloriesBurned,
        RecordKind::Height,
        RecordKind::Weight,
        RecordKind::Hydration,
    ];
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Steps => write!(f, "Steps"),
            RecordKind::Distance => write!(f, "Distance"),
            RecordKind::FloorsClimbed => write!(f, "FloorsClimbed"),
            RecordKind::SleepSession => write!(f, "SleepSession"),
            RecordKind::ExerciseSession => write!(f, "ExerciseSession"),
            RecordKind::ActiveCaloriesBurned => write!(f, "ActiveCaloriesBurned"),
            RecordKind::Height => write!(f, "Height"),
            RecordKind::Weight => write!(f, "Weight"),
            RecordKind::Hydration => write!(f, "Hydration"),
        }
    }
}

/// Half-open query window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeWindow { start, end }
    }

    /// Whether an instant falls inside the window
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }

    /// Whether an interval shares any time with the window.
    ///
    /// Zero-length intervals count when their instant lies inside the window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if end <= start {
            return self.contains(start);
        }
        start < self.end && end > self.start
    }

    /// Whether an interval lies entirely inside the window (end inclusive)
    pub fn encloses(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Step count over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepsRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub count: u64,
}

/// Distance covered over an interval, in meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub meters: f64,
}

/// Floors climbed over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorsRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub floors: u32,
}

/// A sleep period; stage detail is not provided by the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
}

/// A recorded exercise session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSessionRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    /// Platform exercise type, e.g. `RUNNING` or `weightTraining`
    #[serde(default)]
    pub exercise_type: Option<String>,
}

/// Active energy expenditure over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloriesRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub kilocalories: f64,
}

/// Body height measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightRecord {
    pub time: DateTime<Utc>,
    pub meters: f64,
}

/// Body weight measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub time: DateTime<Utc>,
    pub kilograms: f64,
}

/// Water intake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub milliliters: f64,
}

/// Raw health record as served by the external platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HealthRecord {
    Steps(StepsRecord),
    Distance(DistanceRecord),
    FloorsClimbed(FloorsRecord),
    SleepSession(SleepSessionRecord),
    ExerciseSession(ExerciseSessionRecord),
    ActiveCaloriesBurned(CaloriesRecord),
    Height(HeightRecord),
    Weight(WeightRecord),
    Hydration(HydrationRecord),
}

impl HealthRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            HealthRecord::Steps(_) => RecordKind::Steps,
            HealthRecord::Distance(_) => RecordKind::Distance,
            HealthRecord::FloorsClimbed(_) => RecordKind::FloorsClimbed,
            HealthRecord::SleepSession(_) => RecordKind::SleepSession,
            HealthRecord::ExerciseSession(_) => RecordKind::ExerciseSession,
            HealthRecord::ActiveCaloriesBurned(_) => RecordKind::ActiveCaloriesBurned,
            HealthRecord::Height(_) => RecordKind::Height,
            HealthRecord::Weight(_) => RecordKind::Weight,
            HealthRecord::Hydration(_) => RecordKind::Hydration,
        }
    }

    /// Time span covered; point measurements return the same instant twice
    pub fn span(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            HealthRecord::Steps(r) => (r.start_time, r.end_time),
            HealthRecord::Distance(r) => (r.start_time, r.end_time),
            HealthRecord::FloorsClimbed(r) => (r.start_time, r.end_time),
            HealthRecord::SleepSession(r) => (r.start_time, r.end_time),
            HealthRecord::ExerciseSession(r) => (r.start_time, r.end_time),
            HealthRecord::ActiveCaloriesBurned(r) => (r.start_time, r.end_time),
            HealthRecord::Height(r) => (r.time, r.time),
            HealthRecord::Weight(r) => (r.time, r.time),
            HealthRecord::Hydration(r) => (r.start_time, r.end_time),
        }
    }
}

/// Records partitioned by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub steps: Vec<StepsRecord>,
    pub distance: Vec<DistanceRecord>,
    pub floors: Vec<FloorsRecord>,
    pub sleep: Vec<SleepSessionRecord>,
    pub exercise: Vec<ExerciseSessionRecord>,
    pub calories: Vec<CaloriesRecord>,
    pub height: Vec<HeightRecord>,
    pub weight: Vec<WeightRecord>,
    pub hydration: Vec<HydrationRecord>,
}

impl RecordBatch {
    pub fn from_records(records: impl IntoIterator<Item = HealthRecord>) -> Self {
        let mut batch = RecordBatch::default();
        batch.extend(records);
        batch
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = HealthRecord>) {
        for record in records {
            match record {
                HealthRecord::Steps(r) => self.steps.push(r),
                HealthRecord::Distance(r) => self.distance.push(r),
                HealthRecord::FloorsClimbed(r) => self.floors.push(r),
                HealthRecord::SleepSession(r) => self.sleep.push(r),
                HealthRecord::ExerciseSession(r) => self.exercise.push(r),
                HealthRecord::ActiveCaloriesBurned(r) => self.calories.push(r),
                HealthRecord::Height(r) => self.height.push(r),
                HealthRecord::Weight(r) => self.weight.push(r),
                HealthRecord::Hydration(r) => self.hydration.push(r),
            }
        }
    }
}

/// Hours spent in each sleep stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SleepStageBreakdown {
    pub rem: f64,
    pub deep: f64,
    pub light: f64,
    pub awake: f64,
}

impl SleepStageBreakdown {
    pub fn total(&self) -> f64 {
        self.rem + self.deep + self.light + self.awake
    }
}

/// Derived metrics for one day window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub steps: u64,
    pub distance_meters: f64,
    pub floors: u32,
    pub sleep_hours: f64,
    pub sleep_stages: SleepStageBreakdown,
    pub calories_burned: u32,
}

/// An exercise session joined with the calories and distance recorded during it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub id: String,
    pub name: String,
    pub workout_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub calories_burned: u32,

    /// `None` when nothing was recorded, which is not the same as zero
    pub distance_km: Option<f64>,
}

/// Totals for the current calendar week
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWorkoutSummary {
    pub total_workouts: u32,
    pub total_minutes: u32,
    pub total_calories: u32,
}

/// Latest known body measurements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub height_meters: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// Everything a single refresh produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Refresh sequence number that produced this snapshot
    pub sequence: u64,
    pub window: TimeWindow,
    pub daily: DailyMetrics,
    pub body: BodyMeasurements,
    pub hydration_ml: f64,

    /// Newest first
    pub workouts: Vec<WorkoutRecord>,
    pub weekly: WeeklyWorkoutSummary,

    /// Record kinds whose fetch failed and contributed zero
    pub failed_kinds: Vec<RecordKind>,
    pub fetched_at: DateTime<Utc>,

    /// Offset of the day the snapshot was taken for, in seconds east of UTC
    #[serde(default)]
    pub utc_offset_seconds: i32,
}

impl HealthSnapshot {
    /// Offset used to show times in the user's local calendar
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or(Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_window_intersection() {
        let window = TimeWindow::new(at(0, 0), at(12, 0));

        assert!(window.intersects(at(11, 0), at(13, 0)));
        assert!(window.intersects(at(0, 0), at(0, 0)));
        assert!(!window.intersects(at(12, 0), at(13, 0)));
        assert!(!window.intersects(at(12, 0), at(12, 0)));
    }

    #[test]
    fn test_window_encloses() {
        let window = TimeWindow::new(at(8, 0), at(9, 0));

        assert!(window.encloses(at(8, 0), at(9, 0)));
        assert!(window.encloses(at(8, 10), at(8, 20)));
        assert!(!window.encloses(at(7, 59), at(8, 20)));
    }

    #[test]
    fn test_record_batch_partitions_by_kind() {
        let records = vec![
            HealthRecord::Steps(StepsRecord {
                start_time: at(8, 0),
                end_time: at(9, 0),
                count: 1200,
            }),
            HealthRecord::Weight(WeightRecord {
                time: at(7, 0),
                kilograms: 70.5,
            }),
            HealthRecord::Steps(StepsRecord {
                start_time: at(10, 0),
                end_time: at(11, 0),
                count: 800,
            }),
        ];

        let batch = RecordBatch::from_records(records);
        assert_eq!(batch.steps.len(), 2);
        assert_eq!(batch.weight.len(), 1);
        assert!(batch.sleep.is_empty());
    }

    #[test]
    fn test_health_record_json_tag() {
        let json = r#"{"kind":"FloorsClimbed","start_time":"2026-10-18T08:00:00Z","end_time":"2026-10-18T08:05:00Z","floors":3}"#;
        let record: HealthRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.kind(), RecordKind::FloorsClimbed);
        assert_eq!(record.span(), (at(8, 0), at(8, 5)));
    }
}
