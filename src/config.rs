use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FitFusionError;
use crate::logging::LogConfig;
use crate::models::BodyMeasurements;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Daily targets used for progress percentages
    #[serde(default)]
    pub goals: GoalSettings,

    /// Proportional split used to estimate sleep stages
    #[serde(default)]
    pub sleep_split: SleepStageSplit,

    /// Query windows for a refresh
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Conversational assistant settings
    #[serde(default)]
    pub assistant: AssistantSettings,

    /// User-entered height/weight that take precedence over platform records
    #[serde(default)]
    pub profile: ProfileOverrides,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Daily goals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSettings {
    pub daily_steps: u64,

    /// Target sleep per night in hours
    pub sleep_hours: f64,

    /// Daily water target in milliliters
    pub water_ml: f64,

    /// Kilocalories per step used by the calorie estimate
    pub calories_per_step: f64,
}

impl Default for GoalSettings {
    fn default() -> Self {
        GoalSettings {
            daily_steps: 10_000,
            sleep_hours: 8.0,
            water_ml: 2500.0,
            calories_per_step: 0.04,
        }
    }
}

/// Fractions of a sleep session attributed to each stage.
///
/// The platform does not report staging, so these are a heuristic, not
/// measured values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepStageSplit {
    pub rem: f64,
    pub deep: f64,
    pub light: f64,
    pub awake: f64,
}

impl Default for SleepStageSplit {
    fn default() -> Self {
        SleepStageSplit {
            rem: 0.25,
            deep: 0.25,
            light: 0.45,
            awake: 0.05,
        }
    }
}

impl SleepStageSplit {
    /// Weights must be non-negative and add up to one
    pub fn validate(&self) -> std::result::Result<(), FitFusionError> {
        let weights = [self.rem, self.deep, self.light, self.awake];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FitFusionError::Configuration(
                "sleep stage weights must be non-negative".to_string(),
            ));
        }

        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(FitFusionError::Configuration(format!(
                "sleep stage weights must sum to 1.0, got {:.3}",
                sum
            )));
        }

        Ok(())
    }
}

/// How far back a refresh looks for each group of records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Lookback for the latest height/weight measurement
    pub body_lookback_days: u32,

    /// Lookback for the workout log
    pub workout_lookback_days: u32,

    /// Default row count for the `workouts` table
    pub recent_workout_limit: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            body_lookback_days: 30,
            workout_lookback_days: 30,
            recent_workout_limit: 5,
        }
    }
}

/// Hosted model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantSettings {
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub base_url: String,

    pub timeout_secs: u64,

    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        AssistantSettings {
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

impl AssistantSettings {
    /// Read the API key from the configured environment variable
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Manually entered body measurements
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    pub height_meters: Option<f64>,
    pub weight_kg: Option<f64>,
}

impl ProfileOverrides {
    /// Overrides win over platform measurements field by field
    pub fn apply(&self, measured: BodyMeasurements) -> BodyMeasurements {
        BodyMeasurements {
            height_meters: self.height_meters.or(measured.height_meters),
            weight_kg: self.weight_kg.or(measured.weight_kg),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            goals: GoalSettings::default(),
            sleep_split: SleepStageSplit::default(),
            fetch: FetchSettings::default(),
            assistant: AssistantSettings::default(),
            profile: ProfileOverrides::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".fitfusion")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %config_path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }

    /// Reject settings the aggregation code cannot work with
    pub fn validate(&self) -> std::result::Result<(), FitFusionError> {
        self.sleep_split.validate()?;

        if self.goals.daily_steps == 0 {
            return Err(FitFusionError::Configuration(
                "daily step goal must be positive".to_string(),
            ));
        }
        if self.goals.sleep_hours <= 0.0 || self.goals.water_ml <= 0.0 {
            return Err(FitFusionError::Configuration(
                "sleep and water goals must be positive".to_string(),
            ));
        }
        if self.goals.calories_per_step < 0.0 {
            return Err(FitFusionError::Configuration(
                "calories per step cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up a setting by dotted key, e.g. `goals.daily_steps`
    pub fn get_value(&self, key: &str) -> Option<String> {
        let value = toml::Value::try_from(self).ok()?;
        let mut current = &value;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(match current {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
