//! Conversational health assistant
//!
//! Keeps a linear transcript, builds prompts that embed the health context
//! block, and delegates generation to an [`AssistantClient`]. Failures never
//! leave the transcript without an answer: a categorized fallback message is
//! appended instead.

pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, instrument};

use crate::error::AssistantError;
use crate::insights::{context_for_snapshot, format_fixed};
use crate::models::HealthSnapshot;

const GREETING_WITH_DATA: &str = "👋 Hello! I'm your AI health assistant. I have access to your latest health data and can provide personalized advice. How can I help you today?";
const GREETING: &str = "👋 Hello! I'm your AI health assistant. How can I help you today?";

const PRIMING_QUESTION: &str = "Can you help me with health and fitness advice?";
const PRIMING_ANSWER: &str = "I'd be happy to help you with health and fitness advice! I can provide personalized recommendations based on your health data, suggest exercise routines, offer nutrition guidance, analyze your sleep patterns, and more. What specific aspect of your health would you like to focus on today?";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,

    /// Set on fallback messages appended after a failed request
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::User,
            text: text.into(),
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        ChatMessage {
            role: MessageRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ChatMessage {
            is_error: true,
            ..ChatMessage::assistant(text)
        }
    }
}

/// Ordered conversation, always opened by a greeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(has_health_data: bool) -> Self {
        let greeting = if has_health_data {
            GREETING_WITH_DATA
        } else {
            GREETING
        };
        Transcript {
            messages: vec![ChatMessage::assistant(greeting)],
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Conversation starters offered from the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Steps,
    WalkingDistance,
    StairClimbing,
    Sleep,
    Other(String),
}

impl Topic {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "steps" => Topic::Steps,
            "walking distance" | "walking-distance" | "distance" => Topic::WalkingDistance,
            "stair climbing" | "stair-climbing" | "floors" => Topic::StairClimbing,
            "sleep" => Topic::Sleep,
            _ => Topic::Other(raw.trim().to_string()),
        }
    }

    /// Question that opens the conversation, phrased from the snapshot.
    ///
    /// Zero or missing values read as "some".
    pub fn opening_question(&self, snapshot: Option<&HealthSnapshot>) -> String {
        let daily = snapshot.map(|s| &s.daily);
        let known = |value: Option<String>| value.unwrap_or_else(|| "some".to_string());

        match self {
            Topic::Steps => format!(
                "I took {} steps today. Can you analyze this and give me feedback?",
                known(daily.filter(|d| d.steps > 0).map(|d| d.steps.to_string()))
            ),
            Topic::WalkingDistance => format!(
                "I walked {} km today. Is this enough?",
                known(
                    daily
                        .filter(|d| d.distance_meters > 0.0)
                        .map(|d| format_fixed(d.distance_meters / 1000.0, 2))
                )
            ),
            Topic::StairClimbing => format!(
                "I climbed {} floors today. Is this good exercise?",
                known(daily.filter(|d| d.floors > 0).map(|d| d.floors.to_string()))
            ),
            Topic::Sleep => format!(
                "I slept {} hours last night. How can I improve my sleep quality?",
                known(
                    daily
                        .filter(|d| d.sleep_hours > 0.0)
                        .map(|d| format_fixed(d.sleep_hours, 1))
                )
            ),
            Topic::Other(topic) => format!("Can you tell me more about {}?", topic),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Steps => write!(f, "steps"),
            Topic::WalkingDistance => write!(f, "walking distance"),
            Topic::StairClimbing => write!(f, "stair climbing"),
            Topic::Sleep => write!(f, "sleep"),
            Topic::Other(topic) => write!(f, "{}", topic),
        }
    }
}

/// Full prompt for one question
pub fn build_prompt(question: &str, context: Option<&str>) -> String {
    let question = question.trim();
    match context.map(str::trim_end).filter(|c| !c.is_empty()) {
        Some(context) => format!(
            "{}\n\nMy question: {}\n\nPlease provide personalized health advice based on my data.",
            context, question
        ),
        None => question.to_string(),
    }
}

/// Fixed exchange sent ahead of every prompt
pub fn priming_exchange() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(PRIMING_QUESTION),
        ChatMessage::assistant(PRIMING_ANSWER),
    ]
}

/// Text generation backend
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Generate a reply to `prompt`, continuing `history`
    async fn generate(&self, history: &[ChatMessage], prompt: &str)
        -> Result<String, AssistantError>;
}

/// Transcript plus the client that answers it
pub struct HealthAssistant<C: AssistantClient> {
    client: C,
    transcript: Transcript,
}

impl<C: AssistantClient> HealthAssistant<C> {
    pub fn new(client: C, has_health_data: bool) -> Self {
        HealthAssistant {
            client,
            transcript: Transcript::new(has_health_data),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Ask one question, embedding the snapshot's context when there is one.
    ///
    /// On failure the fallback message is appended before the error is returned.
    #[instrument(skip(self, snapshot), fields(has_context = snapshot.is_some()))]
    pub async fn ask(
        &mut self,
        question: &str,
        snapshot: Option<&HealthSnapshot>,
    ) -> Result<String, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }

        self.transcript.push(ChatMessage::user(question));

        let context = snapshot.map(context_for_snapshot);
        let prompt = build_prompt(question, context.as_deref());
        debug!(prompt_len = prompt.len(), "Sending prompt");

        let result = self
            .client
            .generate(&priming_exchange(), &prompt)
            .await
            .and_then(|reply| {
                if reply.trim().is_empty() {
                    Err(AssistantError::EmptyResponse)
                } else {
                    Ok(reply)
                }
            });

        match result {
            Ok(reply) => {
                self.transcript.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                error!(error = %e, category = ?e.category(), "Assistant request failed");
                self.transcript.push(ChatMessage::error(e.user_message()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyMetrics, TimeWindow};
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, AssistantError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(reply: Result<String, AssistantError>) -> Self {
            ScriptedClient {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AssistantClient for ScriptedClient {
        async fn generate(
            &self,
            history: &[ChatMessage],
            prompt: &str,
        ) -> Result<String, AssistantError> {
            assert_eq!(history.len(), 2);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn snapshot(daily: DailyMetrics) -> HealthSnapshot {
        let now = Utc::now();
        HealthSnapshot {
            sequence: 1,
            window: TimeWindow::new(now, now),
            daily,
            body: Default::default(),
            hydration_ml: 0.0,
            workouts: Vec::new(),
            weekly: Default::default(),
            failed_kinds: Vec::new(),
            fetched_at: now,
            utc_offset_seconds: 0,
        }
    }

    #[test]
    fn test_greeting_depends_on_health_data() {
        assert!(Transcript::new(true).messages()[0]
            .text
            .contains("I have access to your latest health data"));
        assert_eq!(Transcript::new(false).messages()[0].text, GREETING);
        assert_eq!(Transcript::new(false).len(), 1);
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt(" Hi? ", None), "Hi?");
        assert_eq!(build_prompt("Hi?", Some("")), "Hi?");
        assert_eq!(
            build_prompt("Am I active?", Some("My current health data:\n- Steps today: 5\n")),
            "My current health data:\n- Steps today: 5\n\nMy question: Am I active?\n\n\
             Please provide personalized health advice based on my data."
        );
    }

    #[test]
    fn test_topic_questions() {
        let snap = snapshot(DailyMetrics {
            steps: 8500,
            distance_meters: 6120.0,
            floors: 0,
            sleep_hours: 7.25,
            ..Default::default()
        });

        assert_eq!(
            Topic::parse("steps").opening_question(Some(&snap)),
            "I took 8500 steps today. Can you analyze this and give me feedback?"
        );
        assert_eq!(
            Topic::parse("Walking Distance").opening_question(Some(&snap)),
            "I walked 6.12 km today. Is this enough?"
        );
        assert_eq!(
            Topic::StairClimbing.opening_question(Some(&snap)),
            "I climbed some floors today. Is this good exercise?"
        );
        assert_eq!(
            Topic::Sleep.opening_question(Some(&snap)),
            "I slept 7.3 hours last night. How can I improve my sleep quality?"
        );
        assert_eq!(
            Topic::Steps.opening_question(None),
            "I took some steps today. Can you analyze this and give me feedback?"
        );
        assert_eq!(
            Topic::parse("hydration").opening_question(None),
            "Can you tell me more about hydration?"
        );
    }

    #[tokio::test]
    async fn test_ask_appends_reply_and_embeds_context() {
        let client = ScriptedClient::new(Ok("Keep walking!".to_string()));
        let mut assistant = HealthAssistant::new(client, true);
        let snap = snapshot(DailyMetrics {
            steps: 1200,
            ..Default::default()
        });

        let reply = assistant.ask("How am I doing?", Some(&snap)).await.unwrap();
        assert_eq!(reply, "Keep walking!");

        let messages = assistant.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2].text, "Keep walking!");
        assert!(!messages[2].is_error);

        let prompts = assistant.client().prompts.lock().unwrap();
        assert!(prompts[0].starts_with("My current health data:\n- Steps today: 1200\n"));
        assert!(prompts[0].contains("My question: How am I doing?"));
    }

    #[tokio::test]
    async fn test_failure_appends_fallback() {
        let cases = [
            (
                AssistantError::Unauthorized {
                    message: "API key not valid".to_string(),
                },
                "Invalid API key. Please check your configuration.",
            ),
            (
                AssistantError::Model {
                    status: 404,
                    message: "model not found".to_string(),
                },
                "Error accessing the AI model. Please try again later.",
            ),
            (
                AssistantError::Transport("connection reset".to_string()),
                "Sorry, I encountered an error. Please try again.",
            ),
        ];

        for (err, fallback) in cases {
            let mut assistant = HealthAssistant::new(ScriptedClient::new(Err(err.clone())), false);
            assert_eq!(assistant.ask("Hello", None).await.unwrap_err(), err);

            let last = assistant.transcript().last().unwrap();
            assert!(last.is_error);
            assert_eq!(last.role, MessageRole::Assistant);
            assert_eq!(last.text, fallback);
        }
    }

    #[tokio::test]
    async fn test_blank_reply_is_an_error() {
        let mut assistant = HealthAssistant::new(ScriptedClient::new(Ok("  ".to_string())), false);
        let err = assistant.ask("Hello", None).await.unwrap_err();
        assert_eq!(err, AssistantError::EmptyResponse);
        assert_eq!(assistant.transcript().len(), 3);
    }
}
