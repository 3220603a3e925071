//! Unified error hierarchy for FitFusion
//!
//! Aggregation and classification never fail on missing data, so the variants
//! here cover the two real I/O seams (the health data source and the
//! conversational assistant) plus configuration and validation problems.

use thiserror::Error;
use tracing::{error, info, warn, Level};

use crate::models::RecordKind;

/// Top-level error type for all FitFusion operations
#[derive(Debug, Error)]
pub enum FitFusionError {
    /// Health data source errors
    #[error("Health data source error: {0}")]
    Source(#[from] SourceError),

    /// Conversational assistant errors
    #[error("Assistant error: {0}")]
    Assistant(#[from] AssistantError),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures reported by a health data source
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The platform could not serve the query
    #[error("{kind} records unavailable: {reason}")]
    Unavailable { kind: RecordKind, reason: String },

    /// Inserting a record failed
    #[error("Failed to write {kind} record: {reason}")]
    WriteFailed { kind: RecordKind, reason: String },
}

impl SourceError {
    /// Record kind the failure applies to
    pub fn kind(&self) -> RecordKind {
        match self {
            SourceError::Unavailable { kind, .. } | SourceError::WriteFailed { kind, .. } => *kind,
        }
    }
}

/// Failures talking to the hosted conversational model
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssistantError {
    /// No API key was configured
    #[error("API key not configured (set {env_var})")]
    MissingApiKey { env_var: String },

    /// The service rejected the API key
    #[error("Invalid API key: {message}")]
    Unauthorized { message: String },

    /// The model could not be reached or failed to generate
    #[error("model error ({status}): {message}")]
    Model { status: u16, message: String },

    /// Request quota exhausted
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Nothing to ask
    #[error("question is empty")]
    EmptyQuestion,

    /// The model answered with no text
    #[error("Empty response received from AI")]
    EmptyResponse,

    /// Network or client failure, or an unexpected HTTP status
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Coarse grouping used to pick the message shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Credentials are missing or rejected
    Auth,
    /// The model itself failed or is unavailable
    Model,
    /// Anything else
    Generic,
}

impl AssistantError {
    pub fn category(&self) -> FailureCategory {
        match self {
            AssistantError::MissingApiKey { .. } | AssistantError::Unauthorized { .. } => {
                FailureCategory::Auth
            }
            AssistantError::Model { .. } | AssistantError::RateLimited { .. } => {
                FailureCategory::Model
            }
            AssistantError::EmptyQuestion
            | AssistantError::EmptyResponse
            | AssistantError::Transport(_)
            | AssistantError::Parse(_) => FailureCategory::Generic,
        }
    }

    /// Fallback text appended to the transcript when a request fails
    pub fn user_message(&self) -> String {
        match self.category() {
            FailureCategory::Auth => "Invalid API key. Please check your configuration.",
            FailureCategory::Model => "Error accessing the AI model. Please try again later.",
            FailureCategory::Generic => "Sorry, I encountered an error. Please try again.",
        }
        .to_string()
    }
}

/// Result type alias for FitFusion operations
pub type Result<T> = std::result::Result<T, FitFusionError>;

impl FitFusionError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FitFusionError::Source(SourceError::Unavailable { .. })
                | FitFusionError::Assistant(AssistantError::Transport(_))
                | FitFusionError::Assistant(AssistantError::RateLimited { .. })
                | FitFusionError::Io(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FitFusionError::Source(SourceError::Unavailable { .. }) => ErrorSeverity::Warning,
            FitFusionError::Validation(_) => ErrorSeverity::Warning,
            FitFusionError::Assistant(e) if e.category() == FailureCategory::Auth => {
                ErrorSeverity::Error
            }
            FitFusionError::Internal(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            FitFusionError::Assistant(e) => e.user_message(),
            FitFusionError::Source(SourceError::Unavailable { kind, .. }) => {
                format!("{} data is currently unavailable. Showing what could be loaded.", kind)
            }
            FitFusionError::Configuration(reason) => {
                format!("Configuration problem: {}", reason)
            }
            _ => self.to_string(),
        }
    }

    /// Emit this error at the tracing level matching its severity
    pub fn log(&self, context: &str) {
        match self.severity().to_tracing_level() {
            Level::ERROR => error!(error = %self, retryable = self.is_retryable(), "{}", context),
            Level::WARN => warn!(error = %self, retryable = self.is_retryable(), "{}", context),
            _ => info!(error = %self, retryable = self.is_retryable(), "{}", context),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            ErrorSeverity::Critical => Level::ERROR,
            ErrorSeverity::Error => Level::ERROR,
            ErrorSeverity::Warning => Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = FitFusionError::Source(SourceError::Unavailable {
            kind: RecordKind::Steps,
            reason: "timeout".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), Level::WARN);

        let err = FitFusionError::Source(SourceError::WriteFailed {
            kind: RecordKind::Hydration,
            reason: "read only".to_string(),
        });
        assert_eq!(err.severity().to_tracing_level(), Level::ERROR);
        assert!(!err.is_retryable());

        let err = FitFusionError::Internal("test".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = FitFusionError::Assistant(AssistantError::Unauthorized {
            message: "bad key".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_error_retryable() {
        let err = FitFusionError::Source(SourceError::Unavailable {
            kind: RecordKind::SleepSession,
            reason: "offline".to_string(),
        });
        assert!(err.is_retryable());

        let err = FitFusionError::Validation("test".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_assistant_categories() {
        let auth = AssistantError::MissingApiKey {
            env_var: "GEMINI_API_KEY".to_string(),
        };
        assert_eq!(auth.category(), FailureCategory::Auth);
        assert!(auth.user_message().contains("API key"));

        let model = AssistantError::Model {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(model.category(), FailureCategory::Model);
        assert!(model.user_message().contains("AI model"));

        assert_eq!(AssistantError::EmptyResponse.category(), FailureCategory::Generic);
        assert_eq!(
            AssistantError::EmptyResponse.user_message(),
            "Sorry, I encountered an error. Please try again."
        );
    }

    #[test]
    fn test_user_messages() {
        let err = FitFusionError::Source(SourceError::Unavailable {
            kind: RecordKind::Weight,
            reason: "offline".to_string(),
        });
        assert!(err.user_message().contains("Weight"));

        let err = FitFusionError::Assistant(AssistantError::RateLimited {
            message: "quota".to_string(),
        });
        assert!(err.is_retryable());
        assert!(err.user_message().contains("AI model"));
    }
}
