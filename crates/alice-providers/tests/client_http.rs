use alice_providers::{LLMProvider, LlmClient, LlmClientConfig, Message, Tool};
use futures_util::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(url: String) -> LlmClient {
    LlmClient::new(LlmClientConfig::new(url, "test-model")).unwrap()
}

fn command_tool() -> Vec<Tool> {
    vec![Tool {
        name: "execute_command".to_string(),
        description: "Execute a shell command".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {"command": {"type": "string"}},
            "required": ["command"]
        }),
    }]
}

#[tokio::test]
async fn ollama_chat_stream_yields_fragments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "test-model", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"message\":{\"content\":\"ab\"}}\n{\"message\":{\"content\":\"cd\"}}",
        ))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/chat", server.uri()));
    let fragments: Vec<String> = client
        .stream_chat(&[Message::user("hi")], 0.7, None)
        .await
        .collect()
        .await;

    assert_eq!(fragments, vec!["ab", "cd"]);
}

#[tokio::test]
async fn openai_stream_stops_at_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\ndata: [DONE]\n\n",
        ))
        .mount(&server)
        .await;

    // Bare host: the completions path is appended.
    let client = client_for(server.uri());
    let fragments: Vec<String> = client
        .stream_chat(&[Message::user("hi")], 0.7, None)
        .await
        .collect()
        .await;

    assert_eq!(fragments, vec!["x"]);
}

#[tokio::test]
async fn ollama_chat_returns_tool_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "execute_command", "arguments": {"command": "ls -la"}}}
                ]
            },
            "done": true
        })))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/chat", server.uri()));
    let tools = command_tool();
    let response = client.chat(&[Message::user("list files")], 0.7, Some(&tools)).await;

    assert_eq!(response.content, "");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "execute_command");
    assert_eq!(response.tool_calls[0].args["command"], "ls -la");
}

#[tokio::test]
async fn openai_chat_parses_string_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Checking.",
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "execute_command", "arguments": "{\"command\":\"pwd\"}"}
                    }]
                }
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/v1/chat/completions", server.uri()));
    let tools = command_tool();
    let response = client.chat(&[Message::user("where am i")], 0.7, Some(&tools)).await;

    assert_eq!(response.content, "Checking.");
    assert_eq!(response.tool_calls[0].id.as_deref(), Some("call_abc"));
    assert_eq!(response.tool_calls[0].args["command"], "pwd");
}

#[tokio::test]
async fn non_success_status_is_reported_inline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(format!("{}/api/chat", server.uri()));

    let response = client.chat(&[Message::user("hi")], 0.7, None).await;
    assert!(response.content.starts_with("[Error: HTTP 500"), "{}", response.content);
    assert!(response.content.contains("boom"));
    assert!(response.tool_calls.is_empty());

    let fragments: Vec<String> = client
        .stream_chat(&[Message::user("hi")], 0.7, None)
        .await
        .collect()
        .await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("\n[Error: HTTP 500"));
}

#[tokio::test]
async fn unreachable_server_is_reported_inline() {
    let server = MockServer::start().await;
    let url = format!("{}/api/chat", server.uri());
    drop(server);

    let client = client_for(url);
    let response = client.chat(&[Message::user("hi")], 0.7, None).await;
    assert!(response.content.starts_with("[Error:"));
    assert!(response.tool_calls.is_empty());

    let fragments: Vec<String> = client
        .stream_chat(&[Message::user("hi")], 0.7, None)
        .await
        .collect()
        .await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("\n[Error:"));
}

#[tokio::test]
async fn sends_basic_auth_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "authorized"}}]
        })))
        .mount(&server)
        .await;

    let mut config = LlmClientConfig::new(server.uri(), "test-model");
    config.username = Some("user".into());
    config.password = Some("pass".into());
    let client = LlmClient::new(config).unwrap();

    let response = client.chat(&[Message::user("hi")], 0.7, None).await;
    assert_eq!(response.content, "authorized");
}
