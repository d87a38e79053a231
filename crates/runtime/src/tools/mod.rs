//! Tool providers and the catalog the model sees.

mod catalog;
mod empty;
pub mod errors;
mod host;
mod mcp_host;

pub use catalog::ToolCatalog;
pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_host::McpToolHost;
