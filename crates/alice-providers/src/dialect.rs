use reqwest::Url;

use crate::{ollama, openai, ChatResponse, LineOutcome};

const CHAT_PATH: &str = "/api/chat";
const GENERATE_PATH: &str = "/api/generate";
const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Wire format spoken by the model server, picked from the endpoint URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Ollama `/api/chat`: message list, NDJSON streaming, native tool calls.
    OllamaChat,
    /// Ollama `/api/generate`: flattened prompt, no tools.
    OllamaGenerate,
    /// OpenAI-compatible `/v1/chat/completions` with SSE streaming.
    OpenAi,
}

impl Dialect {
    pub fn detect(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains(GENERATE_PATH) {
            Dialect::OllamaGenerate
        } else if lower.contains(CHAT_PATH) || lower.contains(":11434") || lower.contains("ollama")
        {
            Dialect::OllamaChat
        } else {
            Dialect::OpenAi
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::OllamaChat => "ollama-chat",
            Dialect::OllamaGenerate => "ollama-generate",
            Dialect::OpenAi => "openai",
        }
    }

    pub fn supports_tools(&self) -> bool {
        !matches!(self, Dialect::OllamaGenerate)
    }

    fn default_path(&self) -> &'static str {
        match self {
            Dialect::OllamaChat => CHAT_PATH,
            Dialect::OllamaGenerate => GENERATE_PATH,
            Dialect::OpenAi => COMPLETIONS_PATH,
        }
    }

    /// Full request URL: the configured one if it names a path, else the dialect default path appended.
    pub fn endpoint(&self, url: &str) -> String {
        let trimmed = url.trim().trim_end_matches('/');
        let has_path = match Url::parse(trimmed) {
            Ok(parsed) => !matches!(parsed.path(), "" | "/"),
            Err(_) => return trimmed.to_string(),
        };

        if has_path {
            trimmed.to_string()
        } else {
            format!("{}{}", trimmed, self.default_path())
        }
    }

    /// Endpoint with any known dialect path removed.
    pub fn host(url: &str) -> String {
        let mut host = url.trim().trim_end_matches('/').to_string();
        for path in [COMPLETIONS_PATH, CHAT_PATH, GENERATE_PATH] {
            if let Some(stripped) = host.strip_suffix(path) {
                host = stripped.to_string();
                break;
            }
        }
        host
    }

    pub fn parse_stream_line(&self, line: &str) -> LineOutcome {
        match self {
            Dialect::OllamaChat | Dialect::OllamaGenerate => ollama::parse_stream_line(line),
            Dialect::OpenAi => openai::parse_stream_line(line),
        }
    }

    pub fn parse_response(&self, body: &str) -> ChatResponse {
        match self {
            Dialect::OllamaChat | Dialect::OllamaGenerate => ollama::parse_response(body),
            Dialect::OpenAi => openai::parse_response(body),
        }
    }
}
