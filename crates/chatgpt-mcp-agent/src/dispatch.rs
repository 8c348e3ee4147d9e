//! Maps `chatgpt` tool calls onto the orchestrator and its results back into
//! MCP envelopes.

use chatgpt_bridge::{
    BridgeError, ConversationList, InteractionRequest, InteractionResult, Orchestrator,
};
use rmcp::model::{CallToolResult, Content, JsonObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::telemetry::ToolCallSpan;

pub const TOOL_NAME: &str = "chatgpt";
pub const TOOL_DESCRIPTION: &str = "Interact with the ChatGPT desktop app on macOS";

pub const EMPTY_ASK_MESSAGE: &str = "No response received from ChatGPT.";
pub const EMPTY_SEARCH_MESSAGE: &str = "No search results received from ChatGPT.";
pub const NO_CONVERSATIONS_MESSAGE: &str = "No conversations found in ChatGPT.";
pub const NOT_RUNNING_MESSAGE: &str = "ChatGPT is not running.";
pub const NO_WINDOW_MESSAGE: &str = "No ChatGPT window found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Ask,
    GetConversations,
    Search,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Ask => "ask",
            Operation::GetConversations => "get_conversations",
            Operation::Search => "search",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChatToolArgs {
    #[schemars(description = "Operation to perform: 'ask', 'get_conversations', or 'search'")]
    pub operation: Operation,
    #[serde(default)]
    #[schemars(
        description = "The prompt to send to ChatGPT (required for ask and search operations)"
    )]
    pub prompt: Option<String>,
    #[serde(default)]
    #[schemars(description = "Optional conversation ID to continue a specific conversation")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    #[schemars(
        description = "Whether to start a new chat before sending the prompt (default: false, true for searches outside a named conversation)"
    )]
    pub start_new_chat: Option<bool>,
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Ask(InteractionRequest),
    Search {
        query: String,
        conversation_id: Option<String>,
        start_new_chat: Option<bool>,
    },
    GetConversations,
}

impl ToolCall {
    pub fn parse(arguments: Option<JsonObject>) -> Result<Self, BridgeError> {
        let arguments = arguments
            .ok_or_else(|| BridgeError::InvalidArgument("No arguments provided".to_string()))?;
        let args: ChatToolArgs = serde_json::from_value(serde_json::Value::Object(arguments))
            .map_err(|e| {
                BridgeError::InvalidArgument(format!("Invalid arguments for ChatGPT tool: {e}"))
            })?;

        let prompt = args.prompt.filter(|p| !p.trim().is_empty());
        match args.operation {
            Operation::Ask => {
                let prompt = prompt.ok_or_else(|| {
                    BridgeError::InvalidArgument("Prompt is required for ask operation".to_string())
                })?;
                Ok(ToolCall::Ask(InteractionRequest {
                    prompt,
                    conversation_id: args.conversation_id,
                    start_new_chat: args.start_new_chat,
                }))
            }
            Operation::Search => {
                let query = prompt.ok_or_else(|| {
                    BridgeError::InvalidArgument(
                        "Prompt is required for search operation".to_string(),
                    )
                })?;
                Ok(ToolCall::Search {
                    query,
                    conversation_id: args.conversation_id,
                    start_new_chat: args.start_new_chat,
                })
            }
            Operation::GetConversations => Ok(ToolCall::GetConversations),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            ToolCall::Ask(_) => Operation::Ask,
            ToolCall::Search { .. } => Operation::Search,
            ToolCall::GetConversations => Operation::GetConversations,
        }
    }
}

/// Input schema of the `chatgpt` tool.
pub fn tool_input_schema() -> JsonObject {
    let schema = schemars::schema_for!(ChatToolArgs);
    match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

/// Validates and runs one `chatgpt` call. Every failure becomes an `isError`
/// envelope; nothing escapes as a protocol error.
pub async fn handle_tool_call(
    orchestrator: &Orchestrator,
    arguments: Option<JsonObject>,
) -> CallToolResult {
    let call = match ToolCall::parse(arguments) {
        Ok(call) => call,
        Err(e) => {
            error!("[dispatch] Rejected tool call: {e}");
            return error_result(&e);
        }
    };

    let operation = call.operation();
    let span = ToolCallSpan::start(&call);
    let outcome = dispatch(orchestrator, call).await;
    if let Err(e) = &outcome {
        error!("[dispatch] {} failed: {e}", operation.as_str());
    }
    span.finish(&outcome);

    match outcome {
        Ok(reply) => CallToolResult::success(vec![Content::text(reply.text)]),
        Err(e) => error_result(&e),
    }
}

/// Rendered text of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Whether generation finished; `None` for conversation listings.
    pub complete: Option<bool>,
}

/// Runs a validated call and renders its text.
pub async fn dispatch(orchestrator: &Orchestrator, call: ToolCall) -> Result<Reply, BridgeError> {
    match call {
        ToolCall::Ask(request) => {
            let result = orchestrator.ask(&request).await?;
            Ok(render_answer(result, EMPTY_ASK_MESSAGE))
        }
        ToolCall::Search {
            query,
            conversation_id,
            start_new_chat,
        } => {
            let result = orchestrator
                .search(&query, conversation_id, start_new_chat)
                .await?;
            Ok(render_answer(result, EMPTY_SEARCH_MESSAGE))
        }
        ToolCall::GetConversations => {
            let list = orchestrator.list_conversations().await?;
            Ok(Reply {
                text: render_conversations(&list),
                complete: None,
            })
        }
    }
}

fn render_answer(result: InteractionResult, empty_message: &str) -> Reply {
    if !result.complete {
        info!("[dispatch] Returning partial response");
    }
    let text = if result.text.trim().is_empty() {
        empty_message.to_string()
    } else {
        result.text
    };
    Reply {
        text,
        complete: Some(result.complete),
    }
}

pub fn render_conversations(list: &ConversationList) -> String {
    match list {
        ConversationList::AppNotRunning => NOT_RUNNING_MESSAGE.to_string(),
        ConversationList::NoWindow => NO_WINDOW_MESSAGE.to_string(),
        ConversationList::Found(titles) if titles.is_empty() => {
            NO_CONVERSATIONS_MESSAGE.to_string()
        }
        ConversationList::Found(titles) => format!(
            "Found {} conversation(s):\n\n{}",
            titles.len(),
            titles.join("\n")
        ),
    }
}

pub fn error_result(err: &BridgeError) -> CallToolResult {
    let message = match err {
        BridgeError::InvalidArgument(msg) => msg.clone(),
        other => other.to_string(),
    };
    CallToolResult::error(vec![Content::text(format!("Error: {message}"))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> Option<JsonObject> {
        match value {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        }
    }

    #[test]
    fn test_parse_ask() {
        let call = ToolCall::parse(args(json!({
            "operation": "ask",
            "prompt": "What is 2+2?",
            "conversation_id": "Math"
        })))
        .unwrap();
        assert_eq!(
            call,
            ToolCall::Ask(InteractionRequest::new("What is 2+2?").with_conversation("Math"))
        );
    }

    #[test]
    fn test_parse_requires_arguments() {
        let err = ToolCall::parse(None).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: No arguments provided");
    }

    #[test]
    fn test_parse_rejects_missing_prompt() {
        let err = ToolCall::parse(args(json!({"operation": "ask"}))).unwrap_err();
        assert!(err.to_string().contains("Prompt is required for ask operation"));

        let err = ToolCall::parse(args(json!({"operation": "search", "prompt": "  "}))).unwrap_err();
        assert!(err.to_string().contains("Prompt is required for search operation"));
    }

    #[test]
    fn test_parse_rejects_unknown_operation_and_bad_types() {
        let err = ToolCall::parse(args(json!({"operation": "delete"}))).unwrap_err();
        assert!(err.to_string().contains("Invalid arguments for ChatGPT tool"));

        let err = ToolCall::parse(args(json!({
            "operation": "ask",
            "prompt": "hi",
            "start_new_chat": "yes"
        })))
        .unwrap_err();
        assert!(err.to_string().contains("Invalid arguments for ChatGPT tool"));
    }

    #[test]
    fn test_get_conversations_ignores_prompt() {
        let call =
            ToolCall::parse(args(json!({"operation": "get_conversations", "prompt": "x"}))).unwrap();
        assert_eq!(call, ToolCall::GetConversations);
    }

    #[test]
    fn test_render_conversations() {
        assert_eq!(
            render_conversations(&ConversationList::Found(vec![
                "Trip planning".to_string(),
                "Rust questions".to_string()
            ])),
            "Found 2 conversation(s):\n\nTrip planning\nRust questions"
        );
        assert_eq!(
            render_conversations(&ConversationList::Found(Vec::new())),
            NO_CONVERSATIONS_MESSAGE
        );
        assert_eq!(
            render_conversations(&ConversationList::AppNotRunning),
            NOT_RUNNING_MESSAGE
        );
        assert_eq!(render_conversations(&ConversationList::NoWindow), NO_WINDOW_MESSAGE);
    }

    #[test]
    fn test_schema_requires_operation() {
        let schema = tool_input_schema();
        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .cloned()
            .unwrap_or_default();
        assert_eq!(required, vec![json!("operation")]);
        assert!(schema
            .get("properties")
            .and_then(|p| p.get("start_new_chat"))
            .is_some());
    }

    #[test]
    fn test_error_result_is_flagged() {
        let result = error_result(&BridgeError::InvalidArgument("No arguments provided".into()));
        assert_eq!(result.is_error, Some(true));
    }
}
