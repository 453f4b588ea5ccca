use alice_providers::Tool;
use serde_json::{json, Map, Value};

pub const EXECUTE_COMMAND: &str = "execute_command";

/// Tool schemas offered to the model when function calling is on.
pub fn create_tool_definitions() -> Vec<Tool> {
    vec![Tool {
        name: EXECUTE_COMMAND.to_string(),
        description: "Execute a system command on the user's machine after they confirm it. \
            Only allowlisted commands run, and pipes, redirection and command chaining are rejected. \
            Use only when the user explicitly asks for a command or file operation."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The full command line to run, e.g. 'ls -la' or 'git status'"
                }
            },
            "required": ["command"]
        }),
    }]
}

/// Build one command line from tool arguments.
///
/// `command` holds the whole line. The older `{command, args: [...]}` shape is
/// also accepted: array items are appended, quoted when they contain spaces.
pub fn command_line_from_args(args: &Map<String, Value>) -> Option<String> {
    let command = args.get("command")?.as_str()?.trim();
    if command.is_empty() {
        return None;
    }

    let mut line = command.to_string();
    if let Some(extra) = args.get("args").and_then(Value::as_array) {
        for item in extra {
            let text = match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if text.is_empty() {
                continue;
            }
            line.push(' ');
            if text.chars().any(char::is_whitespace) {
                line.push('"');
                line.push_str(&text);
                line.push('"');
            } else {
                line.push_str(&text);
            }
        }
    }
    Some(line)
}
