//! OpenAI-compatible chat completions (llama.cpp server, vLLM, LM Studio, ...).
//!
//! Streaming replies are server-sent events: `data: <json>` lines carrying
//! `choices[0].delta.content`, terminated by `data: [DONE]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::stream::error_fragment;
use crate::{ChatResponse, LineOutcome, Message, MessageRole, Tool, ToolCall};

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    r#type: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

/// `max_tokens` carries the context-length hint; servers read it as a reply cap.
pub fn chat_request(
    model: &str,
    messages: &[Message],
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Option<&[Tool]>,
    stream: bool,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: messages.iter().map(convert_message).collect(),
        stream,
        temperature,
        max_tokens,
        tools: tools.map(|tools| {
            tools
                .iter()
                .map(|tool| WireTool {
                    r#type: "function",
                    function: WireFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.input_schema.clone(),
                    },
                })
                .collect()
        }),
    }
}

fn convert_message(message: &Message) -> WireMessage {
    let tool_calls = message
        .tool_calls
        .iter()
        .enumerate()
        .map(|(index, call)| WireToolCall {
            id: call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{}", index)),
            r#type: "function",
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: Value::Object(call.args.clone()).to_string(),
            },
        })
        .collect();

    WireMessage {
        role: message.role.as_str(),
        content: message.content.clone(),
        tool_calls,
        tool_call_id: match message.role {
            MessageRole::Tool => message.tool_call_id.clone(),
            _ => None,
        },
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionReply {
    choices: Option<Vec<Choice>>,
    error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Choice {
    delta: Option<ChoiceMessage>,
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ReplyToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ReplyToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ReplyFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ReplyFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl CompletionReply {
    fn first_choice(self) -> Option<Choice> {
        self.choices.and_then(|choices| choices.into_iter().next())
    }
}

fn error_text(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match error {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

pub fn parse_stream_line(line: &str) -> LineOutcome {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        // `event:`/`id:` fields and `:` keep-alive comments.
        return LineOutcome::skip();
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return LineOutcome::done();
    }

    let reply: CompletionReply = match serde_json::from_str(payload) {
        Ok(reply) => reply,
        Err(e) => {
            debug!("Failed to parse SSE payload: {} - Line: {}", e, line);
            return LineOutcome::skip();
        }
    };

    if let Some(error) = &reply.error {
        return LineOutcome {
            text: Some(error_fragment(error_text(error))),
            done: true,
        };
    }

    let text = reply
        .first_choice()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|text| !text.is_empty());

    LineOutcome { text, done: false }
}

pub fn parse_response(body: &str) -> ChatResponse {
    let reply: CompletionReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Unexpected completion response shape: {} - Response: {}", e, body);
            return ChatResponse::default();
        }
    };

    if let Some(error) = &reply.error {
        return ChatResponse::error(error_text(error));
    }

    let Some(message) = reply.first_choice().and_then(|choice| choice.message) else {
        return ChatResponse::default();
    };

    ChatResponse {
        content: message.content.unwrap_or_default(),
        tool_calls: message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::from_raw(tc.id, tc.function.name, &tc.function.arguments))
            .collect(),
    }
}
