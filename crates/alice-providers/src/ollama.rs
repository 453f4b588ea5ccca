//! Ollama wire format (`/api/chat` and `/api/generate`).
//!
//! Requests carry sampling settings in an `options` object. Streaming replies
//! are one JSON object per line with the text under `message.content` (chat)
//! or `response` (generate) and `done: true` on the last line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::stream::error_fragment;
use crate::{ChatResponse, LineOutcome, Message, Tool, ToolCall};

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OllamaTool>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    r#type: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCallOut>,
}

#[derive(Debug, Serialize)]
struct OllamaToolCallOut {
    function: OllamaToolCallFunctionOut,
}

#[derive(Debug, Serialize)]
struct OllamaToolCallFunctionOut {
    name: String,
    arguments: Value,
}

pub fn chat_request(
    model: &str,
    messages: &[Message],
    temperature: f32,
    num_ctx: Option<u32>,
    tools: Option<&[Tool]>,
    stream: bool,
) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: messages.iter().map(convert_message).collect(),
        tools: tools.map(convert_tools),
        stream,
        options: OllamaOptions {
            temperature,
            num_ctx,
        },
    }
}

pub fn generate_request(
    model: &str,
    messages: &[Message],
    temperature: f32,
    num_ctx: Option<u32>,
    stream: bool,
) -> GenerateRequest {
    GenerateRequest {
        model: model.to_string(),
        prompt: flatten_prompt(messages),
        stream,
        options: OllamaOptions {
            temperature,
            num_ctx,
        },
    }
}

/// Render a conversation as `Role: content` lines with a trailing `Assistant:` cue.
pub fn flatten_prompt(messages: &[Message]) -> String {
    let mut lines: Vec<String> = messages
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect();
    lines.push("Assistant:".to_string());
    lines.join("\n")
}

fn convert_message(message: &Message) -> OllamaMessage {
    OllamaMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| OllamaToolCallOut {
                function: OllamaToolCallFunctionOut {
                    name: call.name.clone(),
                    arguments: Value::Object(call.args.clone()),
                },
            })
            .collect(),
    }
}

fn convert_tools(tools: &[Tool]) -> Vec<OllamaTool> {
    tools
        .iter()
        .map(|tool| OllamaTool {
            r#type: "function",
            function: OllamaFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OllamaReply {
    message: Option<OllamaReplyMessage>,
    response: Option<String>,
    done: Option<bool>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OllamaReplyMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OllamaToolCallIn>>,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallIn {
    #[serde(default)]
    id: Option<String>,
    function: OllamaToolCallFunctionIn,
}

#[derive(Debug, Deserialize)]
struct OllamaToolCallFunctionIn {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaReply {
    fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .or(self.response.as_deref())
    }
}

pub fn parse_stream_line(line: &str) -> LineOutcome {
    let chunk: OllamaReply = match serde_json::from_str(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!("Failed to parse Ollama stream chunk: {} - Line: {}", e, line);
            return LineOutcome::skip();
        }
    };

    if let Some(error) = chunk.error {
        return LineOutcome {
            text: Some(error_fragment(error)),
            done: true,
        };
    }

    LineOutcome {
        text: chunk
            .text()
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        done: chunk.done.unwrap_or(false),
    }
}

pub fn parse_response(body: &str) -> ChatResponse {
    let reply: OllamaReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Unexpected Ollama response shape: {} - Response: {}", e, body);
            return ChatResponse::default();
        }
    };

    if let Some(error) = &reply.error {
        return ChatResponse::error(error);
    }

    let content = reply.text().unwrap_or_default().to_string();
    let tool_calls = reply
        .message
        .and_then(|m| m.tool_calls)
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall::from_raw(tc.id, tc.function.name, &tc.function.arguments))
        .collect();

    ChatResponse {
        content,
        tool_calls,
    }
}
