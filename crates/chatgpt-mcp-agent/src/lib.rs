pub mod dispatch;
pub mod logging;
pub mod server;
pub mod telemetry;

pub use dispatch::{handle_tool_call, ChatToolArgs, Operation, ToolCall, TOOL_NAME};
pub use server::ChatGptServer;
