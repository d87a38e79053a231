mod config;
mod error;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use runtime::render::render_transcript;
use runtime::{Agent, AnthropicGateway, Answer, Error as RuntimeError, McpToolHost, ToolHost};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{API_KEY_VAR, Config};
use error::Result;

/// `RUST_LOG` fallback. The first directive targets this binary's crate.
fn default_log_filter() -> String {
    format!("{}=info,runtime=info,mcp=warn", env!("CARGO_CRATE_NAME"))
}

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Answer questions with a language model and MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file [default: ./courier.toml if present]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Tool provider script (.py or .js), overrides [provider]
    #[arg(short, long, global = true)]
    server: Option<PathBuf>,

    /// Model name, overrides backend.model
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Also print the tool calls made while answering
    #[arg(long, global = true)]
    transcript: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Answer a single query and exit
    Ask {
        /// The query text
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List the tools the provider exposes
    Tools,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::discover(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.backend.model = model;
    }
    let server = config.server_config(cli.server.as_deref())?;

    match cli.command {
        Some(Commands::Tools) => {
            let host = McpToolHost::connect(server).await?;
            let listed = cmd_tools(&host).await;
            host.close().await;
            listed
        }
        command => {
            let api_key = config.api_key(std::env::var(API_KEY_VAR).ok())?;
            let gateway = AnthropicGateway::builder(api_key, &config.backend.model)
                .timeout(std::time::Duration::from_secs(config.agent.model_timeout_secs))
                .build()?;
            let agent_config = config.agent_config()?;

            let host = McpToolHost::connect(server).await?;
            info!(provider = host.session().name(), "provider connected");
            // The host is dropped (and its process killed) if connect fails.
            let agent = Agent::connect(gateway, host, agent_config).await?;

            let outcome = match command {
                Some(Commands::Ask { query }) => {
                    cmd_ask(&agent, &query.join(" "), cli.transcript).await
                }
                _ => cmd_chat(&agent, cli.transcript).await,
            };
            agent.host().close().await;
            outcome
        }
    }
}

async fn cmd_tools(host: &McpToolHost) -> Result<()> {
    let tools = host.list_tools().await?;
    if tools.is_empty() {
        println!("No tools exposed.");
        return Ok(());
    }

    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in tools {
        println!("{:<width$}  {}", tool.name, tool.description);
    }
    Ok(())
}

fn display(answer: &Answer, transcript: bool) -> String {
    if transcript {
        render_transcript(answer.conversation.turns())
    } else {
        answer.text.clone()
    }
}

async fn cmd_ask(
    agent: &Agent<AnthropicGateway, McpToolHost>,
    query: &str,
    transcript: bool,
) -> Result<()> {
    let answer = agent.run_query_until(query, interrupted()).await?;
    println!("{}", display(&answer, transcript));
    Ok(())
}

async fn cmd_chat(agent: &Agent<AnthropicGateway, McpToolHost>, transcript: bool) -> Result<()> {
    println!("courier v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Tools: {}",
        agent.catalog().names().collect::<Vec<_>>().join(", ")
    );
    println!("Type 'quit' or Ctrl+D to exit. Ctrl+C cancels a running query.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = interrupted() => None,
        };
        let Some(line) = line else {
            // EOF or Ctrl+C at the prompt
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        match agent.run_query_until(input, interrupted()).await {
            Ok(answer) => println!("\n{}\n", display(&answer, transcript)),
            Err(RuntimeError::Cancelled) => eprintln!("\nCancelled.\n"),
            Err(e) => eprintln!("\nError: {e}\n"),
        }
    }

    println!("\nSession ended.");
    Ok(())
}

/// Completes on Ctrl+C. Never completes if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
