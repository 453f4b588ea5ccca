//! Command proposals in free-form replies, used when function calling is off.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::tools::command_line_from_args;

fn hint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[execute_command:\s*(\{[\s\S]*?\})\]").expect("valid regex"))
}

fn call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)execute_command\s*[:(]\s*["'`]?([\w.-]+)([^)\]\n\r"'`]*)"#)
            .expect("valid regex")
    })
}

fn bare_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bexecute_command\s+([\w.-]+)([^\n\r]*)").expect("valid regex")
    })
}

/// Find a proposed command line in assistant text.
///
/// Recognized, in order: `[execute_command: {"command": ..., "args": [...]}]`,
/// `execute_command(ls -la)` / `execute_command: ls -la`, and
/// `execute_command ls -la`.
pub fn extract_command_from_text(text: &str) -> Option<String> {
    if let Some(caps) = hint_re().captures(text) {
        // Models often emit single-quoted pseudo-JSON.
        let raw = caps[1].replace('\'', "\"");
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => {
                if let Some(line) = command_line_from_args(&map) {
                    return Some(line);
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Ignoring malformed execute_command hint: {}", e),
        }
    }

    for re in [call_re(), bare_re()] {
        if let Some(caps) = re.captures(text) {
            return Some(join_words(&caps[1], caps.get(2).map_or("", |m| m.as_str())));
        }
    }

    None
}

fn join_words(command: &str, rest: &str) -> String {
    std::iter::once(command)
        .chain(
            rest.split_whitespace()
                .filter(|word| !matches!(*word, "]" | ")" | ".")),
        )
        .collect::<Vec<_>>()
        .join(" ")
}

/// A command proposed by a `parse_action` result with `run_command`/`execute_command`.
pub fn command_from_action(action: &Value) -> Option<String> {
    match action.get("action").and_then(Value::as_str) {
        Some("run_command") | Some("execute_command") => {
            command_line_from_args(action.as_object()?)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bracket_hint_with_json() {
        let text = r#"I'll list them. [execute_command: {"command": "ls", "args": ["-la"]}]"#;
        assert_eq!(extract_command_from_text(text).as_deref(), Some("ls -la"));
    }

    #[test]
    fn bracket_hint_with_single_quotes() {
        let text = "[execute_command: {'command': 'git status'}]";
        assert_eq!(extract_command_from_text(text).as_deref(), Some("git status"));
    }

    #[test]
    fn call_syntax() {
        assert_eq!(
            extract_command_from_text("Running execute_command(ls -la) now").as_deref(),
            Some("ls -la")
        );
        assert_eq!(
            extract_command_from_text("EXECUTE_COMMAND: pwd").as_deref(),
            Some("pwd")
        );
        assert_eq!(
            extract_command_from_text(r#"execute_command("whoami")"#).as_deref(),
            Some("whoami")
        );
    }

    #[test]
    fn bare_syntax() {
        assert_eq!(
            extract_command_from_text("Sure:\nexecute_command df -h\nthanks").as_deref(),
            Some("df -h")
        );
    }

    #[test]
    fn nothing_proposed() {
        assert_eq!(extract_command_from_text("Hello! How can I help?"), None);
        assert_eq!(extract_command_from_text(""), None);
    }

    #[test]
    fn action_objects() {
        assert_eq!(
            command_from_action(&json!({"action": "run_command", "command": "ls", "args": ["-a"]}))
                .as_deref(),
            Some("ls -a")
        );
        assert_eq!(
            command_from_action(&json!({"action": "execute_command", "command": "pwd"})).as_deref(),
            Some("pwd")
        );
        assert_eq!(
            command_from_action(&json!({"action": "respond", "text": "hi"})),
            None
        );
    }
}
