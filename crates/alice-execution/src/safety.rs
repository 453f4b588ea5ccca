use std::collections::HashSet;

use crate::platform::Platform;

/// Shell metacharacters for sequencing, piping, redirection and expansion.
/// Multi-character tokens come first so the reported reason is the most specific one.
pub const BLOCKED_PATTERNS: &[&str] = &["&&", "||", "$(", "|", ">", "<", ";", "`", "$"];

/// Characters `cmd /C` still interprets: command separator, escape, variable expansion.
const CMD_METACHARACTERS: &[&str] = &["&", "^", "%"];

const COMMON_COMMANDS: &[&str] = &["cd", "echo", "whoami", "hostname", "tree"];

const UNIX_COMMANDS: &[&str] = &[
    "ls", "cat", "pwd", "date", "ps", "df", "du", "find", "grep", "head", "tail", "wc", "which",
    "uname", "file", "stat", "uptime", "env",
];

const WINDOWS_COMMANDS: &[&str] = &[
    "dir", "type", "where", "ver", "vol", "copy", "move", "findstr", "tasklist", "systeminfo",
    "ipconfig",
];

const DEV_TOOLS: &[&str] = &[
    "git", "docker", "python", "python3", "pip", "pip3", "node", "npm", "cargo", "rustc", "go",
    "make",
];

/// Allowlist and blocked-pattern validator.
///
/// `is_safe` is a pure function of its inputs: the allowlist is fixed at
/// construction time for the target platform.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    platform: Platform,
    allowed: HashSet<String>,
}

impl SafetyGate {
    pub fn new(platform: Platform) -> Self {
        let platform_commands = match platform {
            Platform::Unix => UNIX_COMMANDS,
            Platform::Windows => WINDOWS_COMMANDS,
        };

        let allowed = COMMON_COMMANDS
            .iter()
            .chain(platform_commands)
            .chain(DEV_TOOLS)
            .map(|c| c.to_string())
            .collect();

        Self { platform, allowed }
    }

    #[cfg(test)]
    pub(crate) fn allowing(mut self, command: &str) -> Self {
        self.allowed.insert(self.platform.normalize(command));
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowed.contains(&self.platform.normalize(command))
    }

    /// Sorted allowlist, for display in prompts and help text.
    pub fn allowed_commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        commands.sort_unstable();
        commands
    }

    /// Check whether `command` with `args` may run. The error carries a human-readable reason.
    pub fn is_safe(&self, command: &str, args: &[String]) -> Result<(), String> {
        if command.trim().is_empty() {
            return Err("Empty command".to_string());
        }

        if !self.is_allowed(command) {
            return Err(format!("Command '{}' is not in the allowlist", command));
        }

        if let Some(pattern) = find_blocked_pattern(command) {
            return Err(format!("Command contains blocked pattern: {}", pattern));
        }

        let args_str = args.join(" ");
        if let Some(pattern) = find_blocked_pattern(&args_str) {
            return Err(format!("Arguments contain blocked pattern: {}", pattern));
        }

        if self.platform.is_interpreter_builtin(command) {
            if let Some(pattern) = CMD_METACHARACTERS
                .iter()
                .copied()
                .find(|pattern| args_str.contains(pattern))
            {
                return Err(format!("Arguments contain blocked pattern: {}", pattern));
            }
        }

        Ok(())
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

fn find_blocked_pattern(text: &str) -> Option<&'static str> {
    BLOCKED_PATTERNS
        .iter()
        .copied()
        .find(|pattern| text.contains(pattern))
}
