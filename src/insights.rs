//! Qualitative labels and the assistant context block
//!
//! # Sleep quality
//!
//! Quality is judged from the share of restorative sleep (deep + REM) among
//! all sleeping time (deep + REM + light). Awake time is ignored. Bands are
//! half-open and each lower bound belongs to the higher band:
//!
//! | ratio              | label     |
//! |--------------------|-----------|
//! | `>= 0.45`          | Excellent |
//! | `[0.35, 0.45)`     | Good      |
//! | `(0.20, 0.35)`     | Fair      |
//! | `<= 0.20`          | Poor      |
//!
//! # Context block
//!
//! [`build_health_context_summary`] output is sent verbatim to the hosted
//! model. Field order and rounding are fixed; change them only together with
//! the prompts that depend on them.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::aggregator::round_to;
use crate::config::GoalSettings;
use crate::models::{
    BodyMeasurements, DailyMetrics, HealthSnapshot, SleepStageBreakdown, WeeklyWorkoutSummary,
    WorkoutRecord,
};

/// Guard for ratios whose denominator may be zero
pub const EPSILON: f64 = 1e-9;

/// Default nightly sleep target in hours
pub const DEFAULT_SLEEP_TARGET_HOURS: f64 = 8.0;

/// Default kilocalories per step for the linear estimate
pub const DEFAULT_CALORIES_PER_STEP: f64 = 0.04;

/// Workouts listed in the context block
pub const MAX_CONTEXT_WORKOUTS: usize = 5;

const EXCELLENT_THRESHOLD: f64 = 0.45;
const GOOD_THRESHOLD: f64 = 0.35;
const POOR_THRESHOLD: f64 = 0.20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SleepQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for SleepQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepQuality::Poor => write!(f, "Poor"),
            SleepQuality::Fair => write!(f, "Fair"),
            SleepQuality::Good => write!(f, "Good"),
            SleepQuality::Excellent => write!(f, "Excellent"),
        }
    }
}

impl SleepQuality {
    /// Classify a restorative-sleep ratio. NaN is treated as no sleep.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= EXCELLENT_THRESHOLD {
            SleepQuality::Excellent
        } else if ratio >= GOOD_THRESHOLD {
            SleepQuality::Good
        } else if ratio > POOR_THRESHOLD {
            SleepQuality::Fair
        } else {
            SleepQuality::Poor
        }
    }
}

/// `(deep + rem) / (deep + rem + light)`, 0 when nothing was slept
pub fn restorative_ratio(stages: &SleepStageBreakdown) -> f64 {
    let restorative = stages.deep + stages.rem;
    restorative / (restorative + stages.light).max(EPSILON)
}

pub fn classify_sleep_quality(stages: &SleepStageBreakdown) -> SleepQuality {
    SleepQuality::from_ratio(restorative_ratio(stages))
}

/// Hours short of the target, never negative
pub fn sleep_debt(sleep_hours: f64, target_hours: f64) -> f64 {
    (target_hours - sleep_hours).max(0.0)
}

/// Rounded percentage of a goal. Not capped at 100; a zero goal yields 0.
pub fn goal_progress_percent(value: f64, goal: f64) -> u32 {
    if goal <= 0.0 || !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value / goal * 100.0).round() as u32
}

/// Percentage of the daily water target reached
pub fn hydration_progress(consumed_ml: f64, target_ml: f64) -> u32 {
    goal_progress_percent(consumed_ml, target_ml)
}

/// Calories inferred from step count rather than measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedCalories(pub u64);

impl EstimatedCalories {
    pub fn kilocalories(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EstimatedCalories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{} kcal (estimated)", self.0)
    }
}

pub fn estimate_calories(steps: u64, per_step_factor: f64) -> EstimatedCalories {
    EstimatedCalories((steps as f64 * per_step_factor.max(0.0)).round() as u64)
}

/// Share of the night spent in each stage, as percentages
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StagePercentages {
    pub rem: f64,
    pub deep: f64,
    pub light: f64,
    pub awake: f64,
}

pub fn stage_percentages(stages: &SleepStageBreakdown) -> StagePercentages {
    let total = stages.total();
    if total <= EPSILON {
        return StagePercentages::default();
    }

    StagePercentages {
        rem: stages.rem / total * 100.0,
        deep: stages.deep / total * 100.0,
        light: stages.light / total * 100.0,
        awake: stages.awake / total * 100.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else {
            BmiCategory::Obese
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BmiCategory::Underweight => write!(f, "Underweight"),
            BmiCategory::Normal => write!(f, "Normal"),
            BmiCategory::Overweight => write!(f, "Overweight"),
            BmiCategory::Obese => write!(f, "Obese"),
        }
    }
}

/// Body mass index to one decimal, when both measurements are known
pub fn body_mass_index(body: &BodyMeasurements) -> Option<f64> {
    let height = body.height_meters.filter(|h| *h > 0.0)?;
    let weight = body.weight_kg.filter(|w| *w > 0.0)?;
    Some(round_to(weight / (height * height), 1))
}

/// Labels shown next to the day's numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyInsights {
    pub steps_progress: u32,
    pub water_progress: u32,
    pub sleep_quality: SleepQuality,
    pub sleep_debt_hours: f64,
    pub estimated_calories: EstimatedCalories,
    pub stage_percentages: StagePercentages,
    pub bmi: Option<f64>,
    pub bmi_category: Option<BmiCategory>,
}

impl DailyInsights {
    pub fn from_snapshot(snapshot: &HealthSnapshot, goals: &GoalSettings) -> Self {
        let daily = &snapshot.daily;
        let bmi = body_mass_index(&snapshot.body);

        DailyInsights {
            steps_progress: goal_progress_percent(daily.steps as f64, goals.daily_steps as f64),
            water_progress: hydration_progress(snapshot.hydration_ml, goals.water_ml),
            sleep_quality: classify_sleep_quality(&daily.sleep_stages),
            sleep_debt_hours: sleep_debt(daily.sleep_hours, goals.sleep_hours),
            estimated_calories: estimate_calories(daily.steps, goals.calories_per_step),
            stage_percentages: stage_percentages(&daily.sleep_stages),
            bmi,
            bmi_category: bmi.map(BmiCategory::from_bmi),
        }
    }
}

/// Fixed-point text with half-away-from-zero rounding
pub fn format_fixed(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, round_to(value, decimals as u32))
}

fn push_workout(out: &mut String, workout: &WorkoutRecord, offset: &FixedOffset) {
    let _ = write!(
        out,
        "  - {} ({}) on {}: {} min, {} kcal",
        workout.name,
        workout.workout_type,
        workout.start_time.with_timezone(offset).format("%Y-%m-%d %H:%M"),
        workout.duration_minutes,
        workout.calories_burned,
    );
    if let Some(km) = workout.distance_km {
        let _ = write!(out, ", {} km", format_fixed(km, 2));
    }
    out.push('\n');
}

/// Plain-text health context handed to the assistant.
///
/// Workouts are listed newest first, at most [`MAX_CONTEXT_WORKOUTS`], with
/// start times shown in `offset`.
pub fn build_health_context_summary(
    metrics: &DailyMetrics,
    body: &BodyMeasurements,
    recent_workouts: &[WorkoutRecord],
    weekly: &WeeklyWorkoutSummary,
    offset: &FixedOffset,
) -> String {
    let mut out = String::from("My current health data:\n");

    let _ = writeln!(out, "- Steps today: {}", metrics.steps);
    let _ = writeln!(
        out,
        "- Distance walked: {} km",
        format_fixed(metrics.distance_meters / 1000.0, 2)
    );
    let _ = writeln!(out, "- Floors climbed: {}", metrics.floors);
    let _ = writeln!(
        out,
        "- Sleep duration: {} hours",
        format_fixed(metrics.sleep_hours, 1)
    );

    if let Some(height) = body.height_meters {
        let _ = writeln!(out, "- Height: {} m", format_fixed(height, 2));
    }
    if let Some(weight) = body.weight_kg {
        let _ = writeln!(out, "- Weight: {} kg", format_fixed(weight, 1));
    }
    if let Some(bmi) = body_mass_index(body) {
        let _ = writeln!(out, "- BMI: {}", format_fixed(bmi, 1));
    }

    let stages = &metrics.sleep_stages;
    out.push_str("- Sleep stages breakdown:\n");
    let _ = writeln!(out, "  - REM sleep: {} hours", format_fixed(stages.rem, 1));
    let _ = writeln!(out, "  - Deep sleep: {} hours", format_fixed(stages.deep, 1));
    let _ = writeln!(out, "  - Light sleep: {} hours", format_fixed(stages.light, 1));
    let _ = writeln!(out, "  - Awake time: {} hours", format_fixed(stages.awake, 1));

    let mut workouts: Vec<&WorkoutRecord> = recent_workouts.iter().collect();
    workouts.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    if workouts.is_empty() {
        out.push_str("- Recent workouts: none recorded\n");
    } else {
        out.push_str("- Recent workouts:\n");
        for workout in workouts.into_iter().take(MAX_CONTEXT_WORKOUTS) {
            push_workout(&mut out, workout, offset);
        }
    }

    let _ = writeln!(
        out,
        "- This week: {} workouts, {} min, {} kcal",
        weekly.total_workouts, weekly.total_minutes, weekly.total_calories
    );

    out
}

/// Context block for a published snapshot
pub fn context_for_snapshot(snapshot: &HealthSnapshot) -> String {
    build_health_context_summary(
        &snapshot.daily,
        &snapshot.body,
        &snapshot.workouts,
        &snapshot.weekly,
        &snapshot.local_offset(),
    )
}
