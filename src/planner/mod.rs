//! LLM-backed planner
//!
//! Appends the user text to a bounded history, runs the chat completion and
//! any tool calls it requests, and returns the assistant's final reply.

mod history;
mod openai;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::LlmConfig;
use crate::tools::{ToolDefinition, ToolRegistry};
use crate::{Error, Result};

pub use history::{ChatMessage, ConversationHistory, FunctionCall, Role, ToolCall};
pub use openai::{ChatClient, Completion};

/// Turns a user utterance into a reply
#[async_trait]
pub trait Planner: Send + Sync {
    /// Produce the reply for one user utterance
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be produced
    async fn respond(&self, text: &str) -> Result<String>;
}

/// Planner backed by an `OpenAI`-compatible chat API with tool calling
pub struct LlmPlanner {
    client: ChatClient,
    tools: ToolRegistry,
    history: Mutex<ConversationHistory>,
    max_tool_rounds: usize,
}

impl LlmPlanner {
    #[must_use]
    pub fn new(client: ChatClient, tools: ToolRegistry, config: &LlmConfig) -> Self {
        Self {
            client,
            tools,
            history: Mutex::new(ConversationHistory::new(
                &config.system_prompt,
                config.max_history,
            )),
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    /// Reset the conversation to the system message
    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
        tracing::info!("conversation history cleared");
    }

    /// Replace the system prompt without touching the rest of the history
    pub async fn set_system_prompt(&self, prompt: &str) {
        self.history.lock().await.set_system_prompt(prompt);
    }

    /// Snapshot of the current history
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.messages().to_vec()
    }

    async fn run_tool_calls(&self, history: &mut ConversationHistory, message: ChatMessage) {
        let calls = message.requested_tools().to_vec();
        history.push(message);

        for call in calls {
            let output = match self
                .tools
                .dispatch(&call.function.name, &call.function.arguments)
                .await
            {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(tool = %call.function.name, error = %e, "tool call failed");
                    format!("Error: {e}")
                }
            };
            history.push(ChatMessage::tool(&call.id, &output));
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn respond(&self, text: &str) -> Result<String> {
        let mut history = self.history.lock().await;
        history.push_user(text);

        let definitions = self.tools.definitions();

        // The final round offers no tools so the model has to answer in text
        for round in 0..=self.max_tool_rounds {
            let offered: &[ToolDefinition] = if round < self.max_tool_rounds {
                definitions.as_slice()
            } else {
                &[]
            };

            let completion = self.client.complete(history.messages(), offered).await?;

            if completion.message.requested_tools().is_empty() {
                let reply = completion
                    .message
                    .content
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string();

                history.push(ChatMessage::assistant(&reply));
                tracing::debug!(
                    rounds = round,
                    finish_reason = completion.finish_reason.as_deref().unwrap_or("none"),
                    "planner reply ready"
                );
                return Ok(reply);
            }

            tracing::debug!(
                round,
                calls = completion.message.requested_tools().len(),
                "executing tool calls"
            );
            self.run_tool_calls(&mut history, completion.message).await;
        }

        Err(Error::Planner(format!(
            "no reply after {} tool rounds",
            self.max_tool_rounds
        )))
    }
}
