// Library interface for FitFusion modules
// The binary and the integration tests both go through these exports

pub mod aggregator;
pub mod assistant;
pub mod config;
pub mod error;
pub mod insights;
pub mod logging;
pub mod models;
pub mod session;
pub mod source;

// Re-export commonly used types for convenience
pub use models::*;
pub use assistant::{AssistantClient, GeminiClient, HealthAssistant, Topic, Transcript};
pub use config::AppConfig;
pub use error::{AssistantError, FitFusionError, Result, SourceError};
pub use insights::{build_health_context_summary, DailyInsights, SleepQuality};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use session::{HealthSession, RefreshQuery, RefreshReport};
pub use source::{HealthDataSource, InMemorySource};
