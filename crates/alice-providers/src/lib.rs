//! LLM client for locally hosted model servers.
//!
//! Two wire dialects are supported and picked from the endpoint URL:
//!
//! - **Ollama style** (`/api/chat`, `/api/generate`): JSON request with an
//!   `options` object, newline-delimited JSON streaming.
//! - **OpenAI style** (`/v1/chat/completions` and anything else): JSON request
//!   with top-level sampling fields, `data: …` server-sent events ending with
//!   `data: [DONE]`.
//!
//! Every backend response is normalized into [`ChatResponse`] (or plain text
//! fragments when streaming) before the rest of the program sees it. Transport
//! failures never escape as errors: they surface as `[Error: …]` text.
//!
//! # Usage
//!
//! ```rust,no_run
//! use alice_providers::{LLMProvider, LlmClient, LlmClientConfig, Message};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LlmClient::new(LlmClientConfig::new(
//!         "http://localhost:11434/api/chat",
//!         "qwen2.5:3b",
//!     ))?;
//!
//!     let mut stream = client
//!         .stream_chat(&[Message::user("Hello!")], 0.7, None)
//!         .await;
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment);
//!     }
//!     Ok(())
//! }
//! ```

pub mod action;
mod client;
mod dialect;
pub mod ollama;
pub mod openai;
mod stream;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

pub use action::parse_action;
pub use client::{LlmClient, LlmClientConfig};
pub use dialect::Dialect;
pub use stream::{decode_stream, LineDecoder, LineOutcome};

/// Text fragments of one streamed reply. Finite and not restartable.
pub type CompletionStream = ReceiverStream<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    /// Capitalized name used when a conversation is flattened into a transcript.
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
            MessageRole::Tool => "Tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls requested by an assistant message.
    pub tool_calls: Vec<ToolCall>,
    /// The call a tool message answers.
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool(content: impl Into<String>, tool_call_id: Option<String>) -> Self {
        Self {
            tool_call_id,
            ..Self::new(MessageRole::Tool, content)
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// A capability exposed to the model, described by a JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    pub args: Map<String, Value>,
}

impl ToolCall {
    /// Build a tool call from arguments that may be a JSON object or a JSON-encoded string.
    /// Anything that does not yield an object becomes an empty argument map.
    pub fn from_raw(id: Option<String>, name: impl Into<String>, raw_args: &Value) -> Self {
        let name = name.into();
        let args = match raw_args {
            Value::Object(map) => map.clone(),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    debug!("Discarding unparseable arguments for {}: {}", name, text);
                    Map::new()
                }
            },
            _ => Map::new(),
        };
        Self { id, name, args }
    }
}

/// Normalized result of a non-streaming call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            content: format!("[Error: {}]", message),
            tool_calls: Vec::new(),
        }
    }
}

/// The model-facing seam of the session loop.
///
/// Neither call returns an error: transport problems are reported inline as
/// `[Error: …]` text so a failed request never ends the conversation.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[Message],
        temperature: f32,
        tools: Option<&[Tool]>,
    ) -> CompletionStream;

    async fn chat(
        &self,
        messages: &[Message],
        temperature: f32,
        tools: Option<&[Tool]>,
    ) -> ChatResponse;

    /// Legacy structured-action extraction for replies produced without tool calling.
    fn parse_action(&self, text: &str) -> Value {
        parse_action(text)
    }

    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn endpoint(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_accepts_object_arguments() {
        let call = ToolCall::from_raw(None, "execute_command", &json!({"command": "ls -la"}));
        assert_eq!(call.args.get("command"), Some(&json!("ls -la")));
    }

    #[test]
    fn tool_call_parses_string_arguments() {
        let call = ToolCall::from_raw(
            Some("call_1".into()),
            "execute_command",
            &json!("{\"command\":\"pwd\"}"),
        );
        assert_eq!(call.id.as_deref(), Some("call_1"));
        assert_eq!(call.args.get("command"), Some(&json!("pwd")));
    }

    #[test]
    fn malformed_arguments_become_empty() {
        for raw in [json!("{not json"), json!("[1,2]"), json!(42), Value::Null] {
            let call = ToolCall::from_raw(None, "execute_command", &raw);
            assert!(call.args.is_empty(), "{:?}", raw);
        }
    }

    #[test]
    fn role_names() {
        assert_eq!(MessageRole::Tool.as_str(), "tool");
        assert_eq!(MessageRole::Assistant.label(), "Assistant");
        assert_eq!(
            serde_json::to_value(MessageRole::System).unwrap(),
            json!("system")
        );
    }
}
