//! Tool host trait.

use crate::model::{ToolInvocation, ToolResult, ToolSpec};
use crate::tools::ToolError;
use std::future::Future;

/// Trait for tool providers.
///
/// This is the boundary between the orchestration loop and side effects.
pub trait ToolHost: Send + Sync {
    /// Fetch the tools the provider currently advertises.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<ToolSpec>, ToolError>> + Send;

    /// Execute one invocation. The returned result carries `call.id`.
    fn call_tool(
        &self,
        call: &ToolInvocation,
    ) -> impl Future<Output = Result<ToolResult, ToolError>> + Send;
}
