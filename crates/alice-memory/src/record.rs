use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of the store file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Message(StoredMessage),
    Command(StoredCommand),
}

impl Record {
    pub fn id(&self) -> u64 {
        match self {
            Record::Message(m) => m.id,
            Record::Command(c) => c.id,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Record::Message(m) => &m.session_id,
            Record::Command(c) => &c.session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: u64,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A proposed command and what became of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandRecord {
    pub command: String,
    pub args: Vec<String>,
    pub approved: bool,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl CommandRecord {
    /// A command that was never run.
    pub fn rejected(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCommand {
    pub id: u64,
    pub session_id: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub approved: bool,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    pub created_at: DateTime<Utc>,
}
