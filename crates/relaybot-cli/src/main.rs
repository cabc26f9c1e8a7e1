//! Relaybot CLI — entry point.
//!
//! # Commands
//!
//! - `relaybot chat [-m MESSAGE] [-t THREAD]` — chat (single-shot or REPL)
//! - `relaybot tools` — print the tool definitions the model would receive

mod helpers;
mod repl;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use relaybot_agent::{filesystem_tools, AgentConfig, AgentLoop, McpBridge, ToolRegistry};
use relaybot_core::config::{load_config, Config};
use relaybot_core::conversation::ConversationStore;
use relaybot_providers::{web_search_tool, AnthropicMessenger};

/// Budget for connecting all external tool servers at startup.
const MCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// Relaybot — tool-using chat agent
#[derive(Parser)]
#[command(name = "relaybot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (single-shot or interactive REPL)
    Chat {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation thread identifier
        #[arg(short, long, default_value = "cli:default")]
        thread: String,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Print the tool definitions the model would receive
    Tools,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            thread,
            logs,
        } => {
            init_logging(logs);
            run_chat(message, thread).await
        }
        Commands::Tools => {
            init_logging(false);
            run_tools().await
        }
    }
}

// ─────────────────────────────────────────────
// Chat command
// ─────────────────────────────────────────────

async fn run_chat(message: Option<String>, thread_id: String) -> Result<()> {
    let config = load_config(None);
    let (registry, bridge) = build_registry(&config).await?;
    let agent = build_agent(&config, registry)?;

    let result = match message {
        Some(msg) => {
            // Single-shot mode
            info!(thread = %thread_id, "processing single message");
            match agent.handle_message(&thread_id, &msg).await {
                Ok(response) => {
                    helpers::print_response(&response);
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e)).context("agent processing failed"),
            }
        }
        None => repl::run(&agent, &thread_id).await,
    };

    bridge.close_all().await;
    result
}

async fn run_tools() -> Result<()> {
    let config = load_config(None);
    let (registry, bridge) = build_registry(&config).await?;

    let definitions = registry.definitions();
    if definitions.is_empty() {
        println!("(no tools configured)");
    } else {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
    }

    bridge.close_all().await;
    Ok(())
}

// ─────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────

/// Assemble the tool registry from config: server-side web search, sandboxed
/// filesystem tools, and bridged MCP servers.
async fn build_registry(config: &Config) -> Result<(Arc<ToolRegistry>, McpBridge)> {
    let registry = Arc::new(ToolRegistry::new());

    if config.tools.web_search_enabled {
        registry.add_server_tool(web_search_tool());
    }

    if !config.tools.sandbox_dir.is_empty() {
        let sandbox = helpers::expand_tilde(&config.tools.sandbox_dir);
        std::fs::create_dir_all(&sandbox)
            .with_context(|| format!("failed to create sandbox dir: {}", sandbox.display()))?;
        for tool in filesystem_tools(sandbox) {
            registry.register(tool);
        }
    }

    let mut bridge = McpBridge::new();
    if !config.tools.mcp_servers.is_empty() {
        match tokio::time::timeout(
            MCP_CONNECT_TIMEOUT,
            bridge.connect(&config.tools.mcp_servers, &registry),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "some MCP servers failed to connect"),
            Err(_) => warn!(
                timeout = ?MCP_CONNECT_TIMEOUT,
                "MCP connection timed out; continuing with the tools already registered"
            ),
        }
    }

    Ok((registry, bridge))
}

/// Build an `AgentLoop` from the loaded configuration.
fn build_agent(config: &Config, registry: Arc<ToolRegistry>) -> Result<AgentLoop> {
    if !config.provider.is_configured() {
        warn!("no API key configured; set ANTHROPIC_API_KEY or provider.apiKey");
    }

    let messenger = AnthropicMessenger::new(
        &config.provider.api_key,
        config.provider.api_base.as_deref(),
        &config.agent.model,
        config.agent.max_tokens,
    );

    let agent_config = AgentConfig {
        system_prompt: config.agent.system_prompt.clone(),
        max_tool_iterations: config.agent.max_tool_iterations,
        tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
    };

    Ok(AgentLoop::new(
        Arc::new(messenger),
        registry,
        Arc::new(ConversationStore::new()),
        agent_config,
    ))
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("relaybot=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
