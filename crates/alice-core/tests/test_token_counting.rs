use alice_core::context::percentage_used;
use alice_core::estimate_tokens;
use alice_providers::{Message, ToolCall};
use serde_json::json;

#[test]
fn test_estimate_grows_with_history() {
    let mut history = vec![Message::user("Hello, how are you today?")];
    let first = estimate_tokens(&history);
    assert_eq!(first, 7); // 25 chars

    history.push(Message::assistant("I'm doing well, thank you for asking!"));
    let second = estimate_tokens(&history);
    assert_eq!(second, 16); // 62 chars
}

#[test]
fn test_tool_calls_do_not_count() {
    let call = ToolCall::from_raw(None, "execute_command", &json!({"command": "ls -la"}));
    let history = vec![Message::assistant("").with_tool_calls(vec![call])];
    assert_eq!(estimate_tokens(&history), 0);
}

#[test]
fn test_percentage_against_budget() {
    let history = vec![Message::user("x".repeat(4000))];
    let used = estimate_tokens(&history);
    assert_eq!(used, 1000);
    assert_eq!(percentage_used(used, 4000), 25.0);
}
