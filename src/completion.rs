//! Multi-candidate reply prediction against a chat-completions model

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::context::ContextWindow;
use crate::{Error, Result};

/// Persona preamble used when no prompt file is configured
pub const DEFAULT_PERSONA_PROMPT: &str = "You speak on behalf of a person who communicates \
through an eye-gaze keyboard. Given what they have typed and the recent conversation, reply \
with one short sentence they would plausibly want to say next, in the first person. Output \
only the sentence.

Recent conversation (user is the person you speak for, other is everyone else):
";

/// One sampling request for `n` independent completions
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub n: usize,
    pub temperature: f32,
}

/// A language model returning several sampled completions per request
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Return completions in the model's response order
    ///
    /// # Errors
    ///
    /// Returns error if the model is unreachable or answers badly
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>>;
}

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChatModel {
    /// Create a client for `base_url` (without the `/chat/completions` suffix)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    /// Build from resolved LLM configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
            config.timeout,
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    n: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    index: usize,
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Choices sorted by `index`, empty contents kept as empty strings
fn ordered_contents(response: ChatResponse) -> Vec<String> {
    let mut choices = response.choices;
    choices.sort_by_key(|c| c.index);
    choices
        .into_iter()
        .map(|c| c.message.content.unwrap_or_default())
        .collect()
}

#[async_trait]
impl CompletionModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            n: request.n,
            temperature: request.temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(error = %e, "completion request failed");
            if e.is_timeout() {
                Error::Timeout(format!("completion: {e}"))
            } else {
                Error::Llm(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("completion API error {status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("malformed completion response: {e}")))?;

        Ok(ordered_contents(chat))
    }
}

/// Predicts candidate replies from the persona, the context window and the user's text
pub struct CompletionEngine {
    model: Arc<dyn CompletionModel>,
    window: ContextWindow,
    persona_prompt: String,
    candidates: usize,
    temperature: f32,
}

impl CompletionEngine {
    #[must_use]
    pub fn new(
        model: Arc<dyn CompletionModel>,
        window: ContextWindow,
        persona_prompt: String,
        candidates: usize,
        temperature: f32,
    ) -> Self {
        Self {
            model,
            window,
            persona_prompt,
            candidates,
            temperature,
        }
    }

    /// Request exactly the configured number of candidates
    ///
    /// Extra candidates are dropped. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns error if the model fails or returns too few candidates
    pub async fn complete(&self, user_text: &str, now: DateTime<Utc>) -> Result<Vec<String>> {
        let request = CompletionRequest {
            system: self.system_prompt(now),
            user: user_text.to_string(),
            n: self.candidates,
            temperature: self.temperature,
        };

        let mut options = self.model.complete(&request).await?;
        if options.len() < self.candidates {
            return Err(Error::Llm(format!(
                "expected {} candidates, model returned {}",
                self.candidates,
                options.len()
            )));
        }
        options.truncate(self.candidates);

        tracing::info!(candidates = options.len(), "prediction complete");
        Ok(options)
    }

    fn system_prompt(&self, now: DateTime<Utc>) -> String {
        let mut system = self.persona_prompt.clone();
        system.push_str(&self.window.render(now));
        system
    }
}
