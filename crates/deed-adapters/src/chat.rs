//! OpenAI-compatible chat-completions classifier.

use async_trait::async_trait;
use deed_core::{ClassifierError, TextClassifier};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const API_KEY_ENV_VAR: &str = "DEED_CLASSIFIER_API_KEY";

const SYSTEM_PROMPT: &str =
    "You review Iranian property deeds for a registration inspection desk. Answer strictly.";
const DEFAULT_MAX_TOKENS: u32 = 8;
const ERROR_BODY_LIMIT: usize = 320;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatClassifierConfig {
    pub endpoint: String,
    pub model: String,
    /// Sent as a bearer token when present; local endpoints usually need none.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Transport-level timeout for one HTTP exchange.
    pub request_timeout_ms: u64,
}

impl Default for ChatClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key: None,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Classifier backed by a chat-completions model.
#[derive(Debug, Clone)]
pub struct ChatCompletionClassifier {
    client: Client,
    config: ChatClassifierConfig,
}

impl ChatCompletionClassifier {
    /// Build the classifier. A missing `api_key` falls back to `DEED_CLASSIFIER_API_KEY`.
    pub fn new(mut config: ChatClassifierConfig) -> Result<Self, ClassifierError> {
        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV_VAR)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                ClassifierError::Unavailable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChatClassifierConfig {
        &self.config
    }

    fn map_send_error(&self, err: reqwest::Error) -> ClassifierError {
        if err.is_timeout() {
            ClassifierError::Timeout {
                after_ms: self.config.request_timeout_ms,
            }
        } else {
            ClassifierError::Transport(format!("chat request failed: {err}"))
        }
    }
}

#[async_trait]
impl TextClassifier for ChatCompletionClassifier {
    fn name(&self) -> &str {
        "chat_completion"
    }

    async fn classify(&self, text: &str, question: &str) -> Result<bool, ClassifierError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": compose_prompt(question, text) },
            ],
            "temperature": 0,
            "max_tokens": DEFAULT_MAX_TOKENS,
        });

        let mut request = self.client.post(&self.config.endpoint).json(&payload);
        if let Some(api_key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Transport(format!(
                "chat endpoint returned {}: {}",
                status,
                truncate(&body, ERROR_BODY_LIMIT)
            )));
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            ClassifierError::MalformedResponse(format!("invalid chat response: {e}"))
        })?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| content_text(&choice.message.content))
            .ok_or_else(|| {
                ClassifierError::MalformedResponse("chat response has no choices".to_string())
            })?;

        let answer = parse_answer(&content)?;
        debug!(model = %self.config.model, answer, "chat classifier answered");
        Ok(answer)
    }
}

/// Full user prompt: instruction, question, answer format, then the fenced deed text.
pub fn compose_prompt(question: &str, text: &str) -> String {
    format!(
        "Analyze the following deed text carefully. {question}\n\
         Only answer with \"Yes\" or \"No\".\n\
         Deed text:\n\
         ---\n\
         {text}\n\
         ---"
    )
}

/// Map a model reply to a boolean by its first word.
pub fn parse_answer(reply: &str) -> Result<bool, ClassifierError> {
    let first_word = reply
        .split(|c: char| !c.is_alphabetic())
        .find(|word| !word.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match first_word.as_str() {
        "yes" | "بله" => Ok(true),
        "no" | "خیر" => Ok(false),
        _ => Err(ClassifierError::MalformedResponse(format!(
            "expected a yes/no answer, got '{}'",
            truncate(reply.trim(), 80)
        ))),
    }
}

// Chat APIs return either a plain string or a list of typed content parts.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out = value.chars().take(max_chars).collect::<String>();
    out.push('…');
    out
}
