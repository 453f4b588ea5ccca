//! Configuration for the Alice assistant.
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`$ALICE_CONFIG`, else `~/.config/alice/config.toml`), then environment
//! variables. A `.env` file in the working directory is loaded first so its
//! entries count as environment variables.

use std::path::{Path, PathBuf};

use config::{File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_MODEL: &str = "qwen2.5:3b";
pub const CONFIG_PATH_ENV: &str = "ALICE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("LLM_COMPLETIONS_URL is not set. Point it at your model server, e.g. http://localhost:11434/api/chat")]
    MissingEndpoint,

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub execution: ExecutionConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub completions_url: Option<String>,
    pub model: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub context_length: Option<u32>,
    pub temperature: f32,
    /// Local servers commonly use self-signed certificates, so this is off by default.
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            completions_url: None,
            model: DEFAULT_MODEL.to_string(),
            username: None,
            password: None,
            context_length: None,
            temperature: 0.7,
            verify_tls: false,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Both halves of the basic-auth pair, or nothing.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub system_prompt: Option<String>,
    pub use_function_calling: bool,
    pub show_thinking: bool,
    /// Token budget shown next to the context estimate.
    pub max_context: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            use_function_calling: true,
            show_thinking: false,
            max_context: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_secs: u64,
    pub max_output: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_output: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: "data/memory.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Integer,
    Float,
    Flag,
    Level,
}

/// Environment variable, config key, and how the value is read.
const ENV_OVERRIDES: &[(&str, &str, Kind)] = &[
    ("LLM_COMPLETIONS_URL", "llm.completions_url", Kind::Text),
    ("MODEL_NAME", "llm.model", Kind::Text),
    ("USERNAME", "llm.username", Kind::Text),
    ("PASSWORD", "llm.password", Kind::Text),
    ("CONTEXT_LENGTH", "llm.context_length", Kind::Integer),
    ("LLM_TEMPERATURE", "llm.temperature", Kind::Float),
    ("LLM_VERIFY_TLS", "llm.verify_tls", Kind::Flag),
    ("LLM_TIMEOUT_SECS", "llm.timeout_secs", Kind::Integer),
    ("SYSTEM_PROMPT", "agent.system_prompt", Kind::Text),
    ("USE_FUNCTION_CALLING", "agent.use_function_calling", Kind::Flag),
    ("SHOW_THINKING", "agent.show_thinking", Kind::Flag),
    ("MODEL_CONTEXT_MAX", "agent.max_context", Kind::Integer),
    ("COMMAND_TIMEOUT_SECS", "execution.timeout_secs", Kind::Integer),
    ("COMMAND_MAX_OUTPUT", "execution.max_output", Kind::Integer),
    ("MEMORY_PATH", "memory.path", Kind::Text),
    ("LOGGING_LEVEL", "logging.level", Kind::Level),
];

impl Config {
    /// Load `.env`, the config file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let file = match std::env::var(CONFIG_PATH_ENV) {
            Ok(explicit) if !explicit.trim().is_empty() => {
                let path = PathBuf::from(shellexpand::tilde(explicit.trim()).as_ref());
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path));
                }
                Some(path)
            }
            _ => default_config_path(),
        };

        Self::from_sources(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build from an optional TOML file and an environment lookup.
    pub fn from_sources<F>(file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            debug!("Reading config file {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        for (var, key, kind) in ENV_OVERRIDES {
            let Some(raw) = env(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            let raw = raw.trim();
            builder = match kind {
                Kind::Text => builder.set_override(*key, raw)?,
                Kind::Flag => builder.set_override(*key, parse_flag(raw))?,
                Kind::Level => builder.set_override(*key, parse_level(raw))?,
                Kind::Integer => match raw.parse::<i64>() {
                    Ok(n) if n >= 0 => builder.set_override(*key, n)?,
                    _ => {
                        debug!("Ignoring non-numeric {}={}", var, raw);
                        builder
                    }
                },
                Kind::Float => match raw.parse::<f64>() {
                    Ok(f) => builder.set_override(*key, f)?,
                    Err(_) => {
                        debug!("Ignoring non-numeric {}={}", var, raw);
                        builder
                    }
                },
            };
        }

        let mut config: Config = builder.build()?.try_deserialize()?;

        if config.agent.max_context.is_none() {
            config.agent.max_context = config.llm.context_length;
        }
        if config
            .agent
            .system_prompt
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            config.agent.system_prompt = None;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.llm.completions_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingEndpoint),
        }
    }

    /// The validated endpoint URL.
    pub fn completions_url(&self) -> Result<&str, ConfigError> {
        self.validate()?;
        self.llm
            .completions_url
            .as_deref()
            .map(str::trim)
            .ok_or(ConfigError::MissingEndpoint)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let path = dirs::home_dir()?.join(".config").join("alice").join("config.toml");
    path.exists().then_some(path)
}

fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

/// Accepts tracing levels as well as `LOGGING.INFO`-style names.
fn parse_level(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let level = lower.strip_prefix("logging.").unwrap_or(&lower);
    match level {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_case_insensitive() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("1"));
    }

    #[test]
    fn logging_levels() {
        assert_eq!(parse_level("LOGGING.INFO"), "info");
        assert_eq!(parse_level("logging.WARNING"), "warn");
        assert_eq!(parse_level("DEBUG"), "debug");
        assert_eq!(parse_level("CRITICAL"), "error");
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert!(config.agent.use_function_calling);
        assert!(!config.agent.show_thinking);
        assert!(!config.llm.verify_tls);
        assert_eq!(config.execution.timeout_secs, 30);
        assert_eq!(config.execution.max_output, 10_000);
        assert_eq!(config.logging.level, "warn");
        assert!(matches!(config.validate(), Err(ConfigError::MissingEndpoint)));
    }

    #[test]
    fn credentials_require_both() {
        let mut llm = LlmConfig {
            username: Some("alice".into()),
            ..LlmConfig::default()
        };
        assert_eq!(llm.credentials(), None);
        llm.password = Some("pw".into());
        assert_eq!(llm.credentials(), Some(("alice", "pw")));
    }
}
