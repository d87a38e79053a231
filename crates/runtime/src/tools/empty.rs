//! Empty tool host implementation.

use crate::model::{ToolInvocation, ToolResult, ToolSpec};
use crate::tools::{ToolError, ToolHost};

/// A host with no tools, for plain chat without a provider.
#[derive(Debug, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(Vec::new())
    }

    async fn call_tool(&self, call: &ToolInvocation) -> Result<ToolResult, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}
