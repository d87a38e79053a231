//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP tool providers via
//! stdio: one child process per [`Session`], line-delimited JSON-RPC 2.0 on its
//! stdin/stdout.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ServerConfig, Session};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::for_script("servers/weather.py")?;
//! let session = Session::connect(config).await?;
//!
//! for tool in session.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = serde_json::Map::new();
//! args.insert("city".into(), "Lisbon".into());
//! let result = session.call_tool("get_forecast", Some(args)).await?;
//! println!("{}", result.text());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod protocol;
mod session;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, EmbeddedResource, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, ServerCapabilities,
    ServerInfo, Tool, ToolContent,
};
pub use session::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, ServerConfig, Session};
