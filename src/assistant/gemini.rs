//! Google Gemini client
//!
//! Calls `models/{model}:generateContent` with the priming history and the
//! prompt as the final user turn. The API key is read from the environment
//! variable named in [`AssistantSettings::api_key_env`] (`GEMINI_API_KEY` by
//! default).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::{AssistantClient, ChatMessage, MessageRole};
use crate::config::AssistantSettings;
use crate::error::AssistantError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Build a client, reading the key from the configured environment variable
    pub fn new(settings: &AssistantSettings) -> Result<Self, AssistantError> {
        let api_key = settings
            .api_key_from_env()
            .ok_or_else(|| AssistantError::MissingApiKey {
                env_var: settings.api_key_env.clone(),
            })?;
        Self::with_api_key(settings, api_key)
    }

    /// Build a client with default settings from `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self, AssistantError> {
        Self::new(&AssistantSettings::default())
    }

    pub fn with_api_key(
        settings: &AssistantSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, AssistantError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AssistantError::MissingApiKey {
                env_var: settings.api_key_env.clone(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AssistantError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(GeminiClient {
            client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            generation: GenerationConfig {
                temperature: settings.temperature,
                top_k: settings.top_k,
                top_p: settings.top_p,
                max_output_tokens: settings.max_output_tokens,
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn role(role: MessageRole) -> &'static str {
        match role {
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        }
    }

    fn build_request(&self, history: &[ChatMessage], prompt: &str) -> GenerateRequest {
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|m| !m.is_error)
            .map(|m| Content {
                role: Some(Self::role(m.role).to_string()),
                parts: vec![Part {
                    text: Some(m.text.clone()),
                }],
            })
            .collect();
        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(prompt.to_string()),
            }],
        });

        GenerateRequest {
            contents,
            generation_config: self.generation.clone(),
        }
    }

    /// Map a non-success status to an error
    fn map_api_error(status: u16, body: &str) -> AssistantError {
        let message = serde_json::from_str::<GenerateResponse>(body)
            .ok()
            .and_then(|r| r.error)
            .map_or_else(|| body.trim().to_string(), |e| e.message);

        match status {
            401 | 403 => AssistantError::Unauthorized { message },
            _ if message.contains("API key") => AssistantError::Unauthorized { message },
            429 => AssistantError::RateLimited { message },
            404 | 500..=599 => AssistantError::Model { status, message },
            _ if message.to_lowercase().contains("model") => {
                AssistantError::Model { status, message }
            }
            _ => AssistantError::Transport(format!("HTTP {}: {}", status, message)),
        }
    }

    /// Concatenated text of the first candidate
    fn extract_text(response: &GenerateResponse) -> Result<String, AssistantError> {
        let text: String = response
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(AssistantError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl AssistantClient for GeminiClient {
    #[instrument(skip(self, history, prompt), fields(model = %self.model))]
    async fn generate(
        &self,
        history: &[ChatMessage],
        prompt: &str,
    ) -> Result<String, AssistantError> {
        let request = self.build_request(history, prompt);
        debug!(turns = request.contents.len(), "Sending request to Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::Transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(Self::map_api_error(status.as_u16(), &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response");
            AssistantError::Parse(e.to_string())
        })?;

        if let Some(api_error) = parsed.error {
            return Err(Self::map_api_error(status.as_u16(), &api_error.message));
        }

        Self::extract_text(&parsed)
    }
}

impl Debug for GeminiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
