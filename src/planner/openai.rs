//! `OpenAI`-compatible chat completions client

use serde::{Deserialize, Serialize};

use super::history::ChatMessage;
use crate::config::LlmConfig;
use crate::tools::ToolDefinition;
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// One assistant turn
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

/// Chat completions over HTTP
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatClient {
    /// Create a client from LLM settings
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for chat".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Request the next assistant turn
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the API rejects it, or no choice
    /// is returned
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: (!tools.is_empty()).then_some(tools),
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "requesting chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion error");
            return Err(Error::Planner(format!("chat API error {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Planner("chat API returned no choices".to_string()))?;

        Ok(Completion {
            message: choice.message,
            finish_reason: choice.finish_reason,
        })
    }
}
