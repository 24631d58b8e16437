//! Tool registry for the planner
//!
//! Maps a tool name to an async handler plus the JSON schema advertised to
//! the LLM. Dispatch validates the schema's `required` fields before calling
//! the handler.

mod builtin;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

pub use builtin::register_builtin_tools;

/// Boxed future returned by a tool handler
pub type ToolFuture = BoxFuture<'static, Result<String>>;

/// Tool handler receiving parsed JSON arguments
pub type ToolHandler = Arc<dyn Fn(Value) -> ToolFuture + Send + Sync>;

/// Tool definition in `OpenAI` function-calling format
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function signature advertised to the LLM
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Registry of callable tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in tools
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_tools(&mut registry);
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register<F>(&mut self, name: &str, description: &str, parameters: Value, handler: F)
    where
        F: Fn(Value) -> ToolFuture + Send + Sync + 'static,
    {
        let definition = ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        };

        if self
            .tools
            .insert(
                name.to_string(),
                RegisteredTool {
                    definition,
                    handler: Arc::new(handler),
                },
            )
            .is_some()
        {
            tracing::warn!(tool = name, "tool re-registered, previous handler replaced");
        }
    }

    /// Definitions for every registered tool, sorted by name
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    ///
    /// `arguments` is the raw JSON string from the LLM; unparseable or empty
    /// arguments are treated as an empty object.
    ///
    /// # Errors
    ///
    /// Returns error if the tool is unknown, a required argument is missing,
    /// or the handler fails
    pub async fn dispatch(&self, name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::Tool(format!("unknown tool: {name}")))?;

        let args: Value = serde_json::from_str(arguments)
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        if let Some(required) = tool.definition.function.parameters["required"].as_array() {
            for field in required.iter().filter_map(Value::as_str) {
                if args.get(field).is_none_or(Value::is_null) {
                    return Err(Error::Tool(format!("{name}: missing argument '{field}'")));
                }
            }
        }

        tracing::debug!(tool = name, %args, "dispatching tool");
        (tool.handler)(args).await
    }
}
