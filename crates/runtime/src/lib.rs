//! Courier runtime: the tool-use loop between a language model and an MCP
//! tool provider.
//!
//! # Overview
//!
//! The runtime is organized around these concepts:
//!
//! - **Agent**: runs one query at a time, alternating model round trips with
//!   tool dispatch until the model answers in plain text.
//! - **ModelGateway**: a trait abstracting model services (Anthropic, etc.).
//! - **ToolHost**: a trait abstracting tool providers; [`McpToolHost`] talks
//!   to an MCP server over stdio.
//! - **Conversation**: the append-only turn history of one query.
//!
//! # Example
//!
//! ```no_run
//! use mcp::ServerConfig;
//! use runtime::{Agent, AgentConfig, AnthropicGateway, McpToolHost};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = AnthropicGateway::builder("sk-ant-api01-...", "claude-3-5-sonnet-20241022")
//!     .build()?;
//! let host = McpToolHost::connect(ServerConfig::for_script("greeter.py")?).await?;
//! let agent = Agent::connect(gateway, host, AgentConfig::default()).await?;
//!
//! let answer = agent.run_query("Say hello").await?;
//! println!("{}", answer.text);
//! agent.host().close().await;
//! # Ok(())
//! # }
//! ```

mod agent;
mod conversation;
mod error;
pub mod model;
pub mod providers;
pub mod render;
pub mod tools;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, Answer, RunStats};
pub use conversation::Conversation;
pub use error::{Error, Result};

// Model types
pub use model::{
    Content, GenerateOptions, ModelError, ModelGateway, ModelReply, ModelRequest, ReplyPart, Role,
    StopReason, ToolInvocation, ToolResult, ToolSpec, Turn, Usage,
};

// Providers
pub use providers::AnthropicGateway;

// Tools
pub use tools::{EmptyToolHost, McpToolHost, ToolCatalog, ToolError, ToolHost};
