//! MCP-backed tool host.

use mcp::{CallToolResult, ServerConfig, Session, ToolContent};

use super::{ToolError, ToolHost};
use crate::model::{Content, ToolInvocation, ToolResult, ToolSpec};

/// Tool host backed by one MCP provider process.
pub struct McpToolHost {
    session: Session,
}

impl McpToolHost {
    /// Spawn the provider and complete the handshake.
    pub async fn connect(config: ServerConfig) -> Result<Self, ToolError> {
        let session = Session::connect(config).await?;
        Ok(Self { session })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Terminate the provider. Idempotent.
    pub async fn close(&self) {
        self.session.close().await;
    }
}

impl ToolHost for McpToolHost {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let tools = self.session.list_tools().await?;
        Ok(tools.into_iter().map(ToolSpec::from).collect())
    }

    async fn call_tool(&self, call: &ToolInvocation) -> Result<ToolResult, ToolError> {
        let result = self
            .session
            .call_tool(&call.name, Some(call.arguments.clone()))
            .await?;
        Ok(into_tool_result(&call.id, result))
    }
}

fn into_tool_result(invocation_id: &str, result: CallToolResult) -> ToolResult {
    let mut content: Vec<Content> = result
        .content
        .into_iter()
        .map(|block| match block {
            ToolContent::Text { text } => Content::Text(text),
            other => Content::Json(serde_json::to_value(&other).unwrap_or_default()),
        })
        .collect();

    if let Some(structured) = result.structured_content {
        content.push(Content::Json(structured));
    }

    ToolResult {
        invocation_id: invocation_id.to_string(),
        content,
        is_error: result.is_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_mixed_content() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Synthetic data generated"},
                {"type": "image", "data": "iVBOR", "mimeType": "image/png"}
            ],
            "structuredContent": {"tables": ["guests", "hotels"]},
            "isError": false
        }))
        .unwrap();

        let converted = into_tool_result("toolu_1", result);
        assert_eq!(converted.invocation_id, "toolu_1");
        assert!(!converted.is_error);
        assert_eq!(converted.content.len(), 3);
        assert_eq!(converted.content[0], Content::Text("Synthetic data generated".into()));
        assert!(matches!(&converted.content[1], Content::Json(v) if v["mimeType"] == "image/png"));
        assert_eq!(
            converted.content[2],
            Content::Json(json!({"tables": ["guests", "hotels"]}))
        );
    }

    #[test]
    fn keeps_error_flag() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "directory not found"}],
            "isError": true
        }))
        .unwrap();
        assert!(into_tool_result("1", result).is_error);
    }
}
