use anyhow::Result;
use chatgpt_bridge::{
    AppleScriptDesktop, BridgeConfig, InteractionRequest, InteractionResult, Orchestrator,
    ReplyScopedClassifier,
};
use chatgpt_mcp_agent::dispatch::render_conversations;
use chatgpt_mcp_agent::logging::{init_logging, LogSettings};
use chatgpt_mcp_agent::server::ChatGptServer;
use chatgpt_mcp_agent::telemetry;
use clap::{Args, Parser, Subcommand};
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info};

/// MCP server that drives the ChatGPT desktop app on macOS
#[derive(Parser)]
#[command(name = "chatgpt-mcp-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Name of the ChatGPT application and process
    #[arg(long, env = "CHATGPT_APP_NAME", global = true)]
    app_name: Option<String>,

    /// Only look for progress markers in text after the echoed prompt
    #[arg(long, env = "CHATGPT_REPLY_SCOPED_MARKERS", global = true)]
    reply_scoped_markers: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the `chatgpt` tool over MCP stdio (default)
    Serve,
    /// Send a prompt and print the answer
    Ask {
        prompt: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Ask ChatGPT to search the web and print the result
    Search {
        query: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List the conversations shown in the sidebar
    Conversations,
}

#[derive(Args)]
struct TargetArgs {
    /// Continue the conversation with this sidebar title
    #[arg(long)]
    conversation_id: Option<String>,
    /// Start a new chat before sending
    #[arg(long)]
    new_chat: bool,
}

impl TargetArgs {
    fn new_chat(&self) -> Option<bool> {
        self.new_chat.then_some(true)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = init_logging(&LogSettings::from_env())?;
    if let Err(e) = telemetry::init_telemetry() {
        error!("Failed to initialize telemetry: {e}");
    }

    let mut config = BridgeConfig::from_env();
    if let Some(app_name) = cli.app_name {
        config.app_name = app_name;
    }
    let desktop = Arc::new(AppleScriptDesktop::new(&config.app_name));
    let stable_checks = config.stable_checks;
    let mut orchestrator = Orchestrator::new(desktop, config);
    if cli.reply_scoped_markers {
        orchestrator =
            orchestrator.with_policy(Arc::new(ReplyScopedClassifier::new(stable_checks)));
    }

    let outcome = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(orchestrator).await,
        Commands::Ask { prompt, target } => {
            let mut request = InteractionRequest::new(prompt);
            request.conversation_id = target.conversation_id.clone();
            request.start_new_chat = target.new_chat();
            let result = orchestrator.ask(&request).await?;
            print_answer("CHATGPT RESPONSE", &result);
            Ok(())
        }
        Commands::Search { query, target } => {
            let result = orchestrator
                .search(&query, target.conversation_id.clone(), target.new_chat())
                .await?;
            print_answer("SEARCH RESULTS", &result);
            Ok(())
        }
        Commands::Conversations => {
            let list = orchestrator.list_conversations().await?;
            println!("{}", render_conversations(&list));
            Ok(())
        }
    };

    telemetry::shutdown_telemetry();
    outcome
}

async fn serve(orchestrator: Orchestrator) -> Result<()> {
    info!("Starting ChatGPT MCP server");
    let service = ChatGptServer::new(orchestrator)
        .serve(rmcp::transport::stdio())
        .await?;
    service.waiting().await?;
    info!("ChatGPT MCP server stopped");
    Ok(())
}

fn print_answer(title: &str, result: &InteractionResult) {
    println!("\n===== {title} =====\n");
    println!("{}", result.text);
    if !result.complete {
        println!("\n(partial response: generation did not finish before the timeout)");
    }
}
