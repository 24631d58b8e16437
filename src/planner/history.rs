//! Conversation history with a bounded window
//!
//! The system message is always first and never evicted. When a user turn
//! pushes the history past the window, the oldest non-system messages are
//! dropped; tool results orphaned by the cut are dropped with them.

use serde::{Deserialize, Serialize};

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

/// Function name and raw JSON arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// A role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::text(Role::System, content)
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::text(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Result of a tool call, linked by id
    #[must_use]
    pub fn tool(tool_call_id: &str, content: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::text(Role::Tool, content)
        }
    }

    /// Tool calls requested by this message, if any
    #[must_use]
    pub fn requested_tools(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Ordered chat history anchored by a system message
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl ConversationHistory {
    /// Create a history holding only the system prompt
    ///
    /// `max_messages` counts the system message and is at least 2.
    #[must_use]
    pub fn new(system_prompt: &str, max_messages: usize) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            max_messages: max_messages.max(2),
        }
    }

    /// Append a user message and enforce the window
    pub fn push_user(&mut self, content: &str) {
        self.messages.push(ChatMessage::user(content));
        self.enforce_window();
    }

    /// Append an assistant, tool, or other message without trimming
    ///
    /// Trimming only happens on user turns so a tool exchange is never split.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system message is never removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything but the system message
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    /// Replace the system prompt in place
    pub fn set_system_prompt(&mut self, prompt: &str) {
        self.messages[0] = ChatMessage::system(prompt);
    }

    fn enforce_window(&mut self) {
        if self.messages.len() <= self.max_messages {
            return;
        }

        let excess = self.messages.len() - self.max_messages;
        self.messages.drain(1..=excess);

        // A tool result without its assistant request is rejected by the API
        while self.messages.len() > 2 && self.messages[1].role == Role::Tool {
            self.messages.remove(1);
        }

        tracing::debug!(len = self.messages.len(), "history trimmed");
    }
}
