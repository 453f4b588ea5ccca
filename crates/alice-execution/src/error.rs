use std::time::Duration;

use thiserror::Error;

/// Reasons a command never produced an exit status.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Unsafe(String),

    #[error("Command timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Command '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Short tag stored in `ExecutionResult::error`.
    pub fn tag(&self) -> String {
        match self {
            ExecutionError::Unsafe(reason) => reason.clone(),
            ExecutionError::Timeout(_) => "Timeout".to_string(),
            ExecutionError::NotFound(_) => "Command not found".to_string(),
            ExecutionError::Io(e) => e.to_string(),
        }
    }
}
