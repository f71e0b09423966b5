//! Question rephrasing via an OpenAI-compatible chat-completions API.
//!
//! This is display sugar only: callers go through
//! [`FunnelService::display_question`](crate::service::FunnelService::display_question),
//! which falls back to the literal question on any failure.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use servicefunnel_shared::{RephraseConfig, Result, ServiceFunnelError};
use tracing::{debug, instrument};

/// User-Agent string for rephrasing requests.
const USER_AGENT: &str = concat!("ServiceFunnel/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// ChatRephraser
// ---------------------------------------------------------------------------

/// Client that asks a chat model to reword a funnel question.
#[derive(Debug, Clone)]
pub struct ChatRephraser {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ChatRephraser {
    /// Build a rephraser from config and an already-resolved API key.
    pub fn new(config: &RephraseConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceFunnelError::Rephrase(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        })
    }

    /// Model this rephraser asks.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model to reword `question`.
    #[instrument(skip_all, fields(model = %self.model))]
    pub async fn rephrase(&self, question: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceFunnelError::Rephrase(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceFunnelError::Rephrase(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceFunnelError::Rephrase(format!("invalid response body: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceFunnelError::Rephrase("response has no choices".into()))?;

        debug!(chars = text.len(), "question rephrased");
        Ok(text.trim().to_string())
    }
}
