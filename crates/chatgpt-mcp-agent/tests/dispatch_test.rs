use chatgpt_bridge::{
    BridgeConfig, ClickTarget, Keystroke, NodeRole, Orchestrator, ScriptedDesktop, UiNode,
    NO_RESPONSE_MESSAGE,
};
use chatgpt_mcp_agent::ChatGptServer;
use rmcp::model::{CallToolResult, JsonObject, RawContent};
use serde_json::json;
use std::sync::Arc;

fn server(desktop: &Arc<ScriptedDesktop>) -> ChatGptServer {
    ChatGptServer::new(Orchestrator::new(desktop.clone(), BridgeConfig::default()))
}

fn args(value: serde_json::Value) -> Option<JsonObject> {
    match value {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn text_of(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|content| match &content.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation(lines: &[&str]) -> Vec<UiNode> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| UiNode::text_at(*line, 120.0, 80.0 + 30.0 * i as f64))
        .collect()
}

#[test]
fn test_single_tool_is_listed() {
    let tools = ChatGptServer::tools();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "chatgpt");
    assert!(tools[0].input_schema.contains_key("properties"));
}

#[tokio::test(start_paused = true)]
async fn test_ask_returns_answer_text() {
    let desktop = Arc::new(
        ScriptedDesktop::new()
            .with_clipboard("notes")
            .with_frames([conversation(&["What is 2+2?", "4."])]),
    );
    let result = server(&desktop)
        .run_tool(
            "chatgpt",
            args(json!({"operation": "ask", "prompt": "What is 2+2?"})),
        )
        .await;

    assert_eq!(result.is_error, Some(false));
    assert_eq!(text_of(&result), "4.");
    assert_eq!(desktop.clipboard(), "notes");
}

#[tokio::test(start_paused = true)]
async fn test_ask_with_empty_window_reports_no_response() {
    let desktop = Arc::new(ScriptedDesktop::new());
    let result = server(&desktop)
        .run_tool("chatgpt", args(json!({"operation": "ask", "prompt": "hello"})))
        .await;

    assert_eq!(result.is_error, Some(false));
    assert_eq!(text_of(&result), NO_RESPONSE_MESSAGE);
}

#[tokio::test(start_paused = true)]
async fn test_search_starts_new_chat_by_default() {
    let desktop = Arc::new(
        ScriptedDesktop::new()
            .with_clickable(ClickTarget::ButtonNamed("New chat".to_string()))
            .with_frames([conversation(&[
                "Rust 1.80 stabilized LazyLock and exclusive range patterns.",
            ])]),
    );
    let result = server(&desktop)
        .run_tool(
            "chatgpt",
            args(json!({"operation": "search", "prompt": "latest Rust release"})),
        )
        .await;

    assert_eq!(result.is_error, Some(false));
    assert!(text_of(&result).contains("LazyLock"));
    assert_eq!(
        desktop.clicked(),
        vec![ClickTarget::ButtonNamed("New chat".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_get_conversations_lists_titles() {
    let desktop = Arc::new(ScriptedDesktop::new().with_sidebar(vec![
        UiNode::new(NodeRole::Button, "New chat"),
        UiNode::new(NodeRole::Button, "Trip planning"),
        UiNode::new(NodeRole::Button, "Borrow checker help"),
    ]));
    let result = server(&desktop)
        .run_tool("chatgpt", args(json!({"operation": "get_conversations"})))
        .await;

    assert_eq!(result.is_error, Some(false));
    assert_eq!(
        text_of(&result),
        "Found 2 conversation(s):\n\nTrip planning\nBorrow checker help"
    );
}

#[tokio::test(start_paused = true)]
async fn test_get_conversations_when_app_is_closed() {
    let desktop = Arc::new(ScriptedDesktop::new().not_running());
    let result = server(&desktop)
        .run_tool("chatgpt", args(json!({"operation": "get_conversations"})))
        .await;

    assert_eq!(result.is_error, Some(false));
    assert_eq!(text_of(&result), "ChatGPT is not running.");
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors_are_error_envelopes() {
    let desktop = Arc::new(ScriptedDesktop::new());
    let server = server(&desktop);

    let result = server.run_tool("chatgpt", None).await;
    assert_eq!(result.is_error, Some(true));
    assert_eq!(text_of(&result), "Error: No arguments provided");

    let result = server
        .run_tool("chatgpt", args(json!({"operation": "ask"})))
        .await;
    assert_eq!(result.is_error, Some(true));
    assert_eq!(text_of(&result), "Error: Prompt is required for ask operation");

    assert!(desktop.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool_is_error_envelope() {
    let desktop = Arc::new(ScriptedDesktop::new());
    let result = server(&desktop)
        .run_tool("gemini", args(json!({"operation": "ask", "prompt": "hi"})))
        .await;

    assert_eq!(result.is_error, Some(true));
    assert_eq!(text_of(&result), "Unknown tool: gemini");
}

#[tokio::test(start_paused = true)]
async fn test_injection_failure_carries_operation_context() {
    let desktop = Arc::new(
        ScriptedDesktop::new()
            .with_clipboard("keep me")
            .failing_keystroke(Keystroke::Submit),
    );
    let result = server(&desktop)
        .run_tool(
            "chatgpt",
            args(json!({"operation": "ask", "prompt": "Summarize this thread"})),
        )
        .await;

    assert_eq!(result.is_error, Some(true));
    let text = text_of(&result);
    assert!(text.starts_with("Error: ask failed (prompt: \"Summarize this thread\")"));
    assert!(text.contains("Prompt injection failed"));
    assert_eq!(desktop.clipboard(), "keep me");
}
