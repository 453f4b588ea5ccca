//! Allowlisted command execution for the Alice assistant.
//!
//! Commands proposed by the model pass through two layers before anything is
//! spawned: the [`SafetyGate`], a pure allowlist and blocked-pattern check, and
//! the [`CommandExecutor`], which re-validates, resolves the platform execution
//! model (direct exec or `cmd /C` builtin dispatch) and runs the process with a
//! hard timeout inside a tracked working directory.

mod error;
mod executor;
mod platform;
mod safety;
mod tokenize;

pub use error::ExecutionError;
pub use executor::{CommandExecutor, ExecutionResult, DEFAULT_MAX_OUTPUT_SIZE, DEFAULT_TIMEOUT, TRUNCATION_MARKER};
pub use platform::Platform;
pub use safety::{SafetyGate, BLOCKED_PATTERNS};
pub use tokenize::split_command_line;
