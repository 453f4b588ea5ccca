use serde_json::{json, Value};

/// Pull a structured action out of free-form model text.
///
/// The span from the first `{` to the last `}` is parsed as JSON; an object
/// carrying an `action` key is returned as is. Anything else becomes
/// `{"action": "respond", "text": <trimmed text>}`.
pub fn parse_action(text: &str) -> Value {
    let trimmed = text.trim();

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if value.get("action").is_some() {
                    return value;
                }
            }
        }
    }

    json!({ "action": "respond", "text": trimmed })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_action_object() {
        let text = r#"Sure. {"action": "run_command", "command": "ls", "args": ["-la"]} Done."#;
        let action = parse_action(text);
        assert_eq!(action["action"], "run_command");
        assert_eq!(action["args"][0], "-la");
    }

    #[test]
    fn plain_text_is_a_response() {
        assert_eq!(
            parse_action("  just chatting  "),
            json!({"action": "respond", "text": "just chatting"})
        );
    }

    #[test]
    fn object_without_action_is_a_response() {
        let action = parse_action(r#"{"command": "ls"}"#);
        assert_eq!(action["action"], "respond");
        assert_eq!(action["text"], r#"{"command": "ls"}"#);
    }

    #[test]
    fn malformed_json_is_ignored() {
        let action = parse_action("{action: run_command");
        assert_eq!(action["action"], "respond");
        let action = parse_action("} backwards {");
        assert_eq!(action["action"], "respond");
    }
}
