use crate::dispatch::{handle_tool_call, tool_input_schema, TOOL_DESCRIPTION, TOOL_NAME};
use chatgpt_bridge::Orchestrator;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::{ErrorData as McpError, ServerHandler};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

const SERVER_INSTRUCTIONS: &str = "Drives the ChatGPT desktop app on macOS through the \
accessibility API. Use the `chatgpt` tool with operation `ask` to send a prompt and wait for \
the answer, `search` to ask ChatGPT to browse the web (slow, up to ten minutes), or \
`get_conversations` to list the conversations in the sidebar. Calls are handled one at a time \
because they share the clipboard and the frontmost window.";

/// MCP handler around one orchestrator. Tool calls are queued so that only
/// one interaction drives the desktop at a time.
#[derive(Clone)]
pub struct ChatGptServer {
    orchestrator: Arc<Mutex<Orchestrator>>,
}

impl ChatGptServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
        }
    }

    pub fn tools() -> Vec<Tool> {
        vec![Tool::new(
            TOOL_NAME,
            TOOL_DESCRIPTION,
            Arc::new(tool_input_schema()),
        )]
    }

    /// Runs a named tool with raw JSON arguments.
    pub async fn run_tool(
        &self,
        name: &str,
        arguments: Option<rmcp::model::JsonObject>,
    ) -> CallToolResult {
        if name != TOOL_NAME {
            warn!("[server] Unknown tool requested: {name}");
            return CallToolResult::error(vec![Content::text(format!("Unknown tool: {name}"))]);
        }

        let orchestrator = self.orchestrator.lock().await;
        handle_tool_call(&orchestrator, arguments).await
    }
}

impl ServerHandler for ChatGptServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
        }
    }

    async fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let start_time = std::time::Instant::now();
        let result = self.run_tool(&request.name, request.arguments).await;
        info!(
            "[server] {} finished in {}ms (error: {})",
            request.name,
            start_time.elapsed().as_millis(),
            result.is_error.unwrap_or(false)
        );
        Ok(result)
    }

    async fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<rmcp::model::ListToolsResult, McpError> {
        Ok(rmcp::model::ListToolsResult::with_all_items(Self::tools()))
    }
}
