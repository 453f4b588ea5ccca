use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::stream::{decode_stream, error_stream};
use crate::{
    ollama, openai, ChatResponse, CompletionStream, Dialect, LLMProvider, Message, MessageRole,
    Tool,
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub url: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sent as `options.num_ctx` (Ollama) or `max_tokens` (OpenAI style).
    pub context_length: Option<u32>,
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl LlmClientConfig {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            system_prompt: None,
            username: None,
            password: None,
            context_length: None,
            verify_tls: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestBody {
    OllamaChat(ollama::ChatRequest),
    OllamaGenerate(ollama::GenerateRequest),
    OpenAi(openai::ChatCompletionRequest),
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    dialect: Dialect,
    endpoint: String,
    host: String,
    model: String,
    system_prompt: Option<String>,
    credentials: Option<(String, String)>,
    context_length: Option<u32>,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let dialect = Dialect::detect(&config.url);
        let endpoint = dialect.endpoint(&config.url);
        let host = Dialect::host(&endpoint);

        let credentials = match (config.username, config.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        };

        info!(
            "Initialized {} client with model: {} at {}",
            dialect.name(),
            config.model,
            endpoint
        );

        Ok(Self {
            client,
            dialect,
            endpoint,
            host,
            model: config.model,
            system_prompt: config.system_prompt.filter(|p| !p.trim().is_empty()),
            credentials,
            context_length: config.context_length,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Prepend the configured system prompt unless the conversation already opens with one.
    fn with_system_prompt(&self, messages: &[Message]) -> Vec<Message> {
        let mut prepared = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            let has_system = messages
                .first()
                .is_some_and(|m| m.role == MessageRole::System);
            if !has_system {
                prepared.push(Message::system(prompt.clone()));
            }
        }
        prepared.extend_from_slice(messages);
        prepared
    }

    fn request_body(
        &self,
        messages: &[Message],
        temperature: f32,
        tools: Option<&[Tool]>,
        stream: bool,
    ) -> RequestBody {
        let messages = self.with_system_prompt(messages);
        match self.dialect {
            Dialect::OllamaChat => RequestBody::OllamaChat(ollama::chat_request(
                &self.model,
                &messages,
                temperature,
                self.context_length,
                tools,
                stream,
            )),
            Dialect::OllamaGenerate => {
                if tools.is_some() {
                    debug!("Generate endpoint takes no tools; dropping tool schemas");
                }
                RequestBody::OllamaGenerate(ollama::generate_request(
                    &self.model,
                    &messages,
                    temperature,
                    self.context_length,
                    stream,
                ))
            }
            Dialect::OpenAi => RequestBody::OpenAi(openai::chat_request(
                &self.model,
                &messages,
                temperature,
                self.context_length,
                tools,
                stream,
            )),
        }
    }

    /// POST the body; any non-2xx status is an error carrying the response text.
    async fn send(&self, body: &RequestBody) -> Result<reqwest::Response> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach {}: {}", self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("HTTP {}: {}", status, error_text));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LLMProvider for LlmClient {
    async fn stream_chat(
        &self,
        messages: &[Message],
        temperature: f32,
        tools: Option<&[Tool]>,
    ) -> CompletionStream {
        debug!(
            "Streaming {} request with {} messages",
            self.dialect.name(),
            messages.len()
        );
        let body = self.request_body(messages, temperature, tools, true);

        match self.send(&body).await {
            Ok(response) => decode_stream(self.dialect, response.bytes_stream()),
            Err(e) => {
                error!("Streaming request failed: {}", e);
                error_stream(e)
            }
        }
    }

    async fn chat(
        &self,
        messages: &[Message],
        temperature: f32,
        tools: Option<&[Tool]>,
    ) -> ChatResponse {
        debug!(
            "Sending {} request with {} messages, {} tools",
            self.dialect.name(),
            messages.len(),
            tools.map_or(0, |t| t.len())
        );
        let body = self.request_body(messages, temperature, tools, false);

        let response = match self.send(&body).await {
            Ok(response) => response,
            Err(e) => {
                error!("Chat request failed: {}", e);
                return ChatResponse::error(e);
            }
        };

        match response.text().await {
            Ok(text) => {
                debug!("Raw response: {}", text);
                self.dialect.parse_response(&text)
            }
            Err(e) => {
                error!("Failed to read response body: {}", e);
                ChatResponse::error(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.dialect.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn client(url: &str, system_prompt: Option<&str>) -> LlmClient {
        let mut config = LlmClientConfig::new(url, "test-model");
        config.system_prompt = system_prompt.map(str::to_string);
        config.context_length = Some(4096);
        LlmClient::new(config).unwrap()
    }

    fn body_json(body: &RequestBody) -> Value {
        serde_json::to_value(body).unwrap()
    }

    #[test]
    fn resolves_endpoint_and_dialect() {
        let c = client("http://localhost:11434", None);
        assert_eq!(c.dialect(), Dialect::OllamaChat);
        assert_eq!(c.endpoint(), "http://localhost:11434/api/chat");
        assert_eq!(c.host(), "http://localhost:11434");
        assert_eq!(c.name(), "ollama-chat");
        assert_eq!(c.model(), "test-model");
    }

    #[test]
    fn injects_system_prompt_once() {
        let c = client("http://localhost:8080/v1/chat/completions", Some("You are Alice."));

        let body = body_json(&c.request_body(&[Message::user("hi")], 0.7, None, false));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], json!({"role": "system", "content": "You are Alice."}));

        let history = [Message::system("Custom"), Message::user("hi")];
        let body = body_json(&c.request_body(&history, 0.7, None, false));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "Custom");
    }

    #[test]
    fn context_length_maps_per_dialect() {
        let ollama = client("http://localhost:11434/api/chat", None);
        let body = body_json(&ollama.request_body(&[Message::user("hi")], 0.7, None, true));
        assert_eq!(body["options"]["num_ctx"], 4096);
        assert!(body.get("max_tokens").is_none());

        let openai = client("http://localhost:8080", None);
        let body = body_json(&openai.request_body(&[Message::user("hi")], 0.7, None, true));
        assert_eq!(body["max_tokens"], 4096);
        assert!(body.get("options").is_none());
    }

    #[test]
    fn generate_drops_tools() {
        let c = client("http://localhost:11434/api/generate", Some("sys"));
        let tools = [Tool {
            name: "execute_command".into(),
            description: "run".into(),
            input_schema: json!({"type": "object"}),
        }];
        let body = body_json(&c.request_body(&[Message::user("hi")], 0.7, Some(&tools), false));
        assert_eq!(body["prompt"], "System: sys\nUser: hi\nAssistant:");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn credentials_need_both_parts() {
        let mut config = LlmClientConfig::new("http://localhost:8080", "m");
        config.username = Some("alice".into());
        assert!(LlmClient::new(config.clone()).unwrap().credentials.is_none());

        config.password = Some("secret".into());
        assert_eq!(
            LlmClient::new(config).unwrap().credentials,
            Some(("alice".to_string(), "secret".to_string()))
        );
    }
}
