use super::errors::ModelError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    ToolResult,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation token chosen by the model service.
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// One block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    Text(String),
    Json(Value),
}

impl Content {
    /// Render the block as plain text for services that only take strings.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }
}

/// Outcome of one tool invocation, correlated by `invocation_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation_id: String,
    pub content: Vec<Content>,
    /// The tool ran but reported failure; the model still gets to see it.
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(invocation_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            content: vec![Content::Text(text.into())],
            is_error: false,
        }
    }

    /// All content blocks rendered as text, newline separated.
    pub fn rendered(&self) -> String {
        self.content
            .iter()
            .map(Content::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A part of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text { text: String },
    ToolUse(ToolInvocation),
    ToolResult(ToolResult),
}

/// One entry in a conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub blocks: Vec<Block>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![Block::Text { text: text.into() }],
        }
    }

    /// The assistant turn for a reply, keeping text and tool blocks in the
    /// order the model produced them.
    pub fn assistant(reply: &ModelReply) -> Self {
        let blocks = reply
            .parts
            .iter()
            .map(|part| match part {
                ReplyPart::Text(text) => Block::Text { text: text.clone() },
                ReplyPart::ToolUse(call) => Block::ToolUse(call.clone()),
            })
            .collect();

        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::ToolResult,
            blocks: results.into_iter().map(Block::ToolResult).collect(),
        }
    }

    /// Text segments of this turn, in order.
    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.blocks.iter().filter_map(|block| match block {
            Block::ToolUse(call) => Some(call),
            _ => None,
        })
    }

    pub fn results(&self) -> impl Iterator<Item = &ToolResult> {
        self.blocks.iter().filter_map(|block| match block {
            Block::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<mcp::Tool> for ToolSpec {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Natural end of response.
    #[default]
    EndTurn,
    /// Model wants to call tools.
    ToolUse,
    /// Hit the output token cap.
    MaxTokens,
    /// Unknown reason (forward compatibility).
    Other(String),
}

/// One element of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPart {
    Text(String),
    ToolUse(ToolInvocation),
}

/// What the model returned for one round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    /// Text and tool requests, interleaved in model order.
    pub parts: Vec<ReplyPart>,
    pub usage: Usage,
    pub stop_reason: StopReason,
}

impl ModelReply {
    /// A reply made of a single text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ReplyPart::Text(text.into())],
            ..Self::default()
        }
    }

    pub fn with_part(mut self, part: ReplyPart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn text_segments(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            ReplyPart::Text(text) => Some(text.as_str()),
            ReplyPart::ToolUse(_) => None,
        })
    }

    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(|part| match part {
            ReplyPart::ToolUse(call) => Some(call),
            ReplyPart::Text(_) => None,
        })
    }

    pub fn has_tool_requests(&self) -> bool {
        self.tool_requests().next().is_some()
    }
}

/// Knobs passed with every model call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Cap on reply length.
    pub max_tokens: u32,
    /// 0.0 is greedy decoding, 1.0 is maximum variance. `None` uses the
    /// service default.
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: None,
            system: None,
        }
    }
}

impl GenerateOptions {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.max_tokens == 0 {
            return Err(ModelError::InvalidOptions("max_tokens must be positive".into()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(ModelError::InvalidOptions(format!(
                    "temperature must be within 0.0..=1.0, got {t}"
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed for one model call.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// The full conversation, in order.
    pub turns: &'a [Turn],
    pub tools: &'a [ToolSpec],
    pub options: &'a GenerateOptions,
}

/// A language-model service.
///
/// Implementations must not keep conversation state between calls; each
/// request carries the whole history.
pub trait ModelGateway: Send + Sync {
    fn generate(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelReply, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(id: &str, name: &str) -> ToolInvocation {
        ToolInvocation {
            id: id.into(),
            name: name.into(),
            arguments: Map::new(),
        }
    }

    #[test]
    fn assistant_turn_keeps_reply_order() {
        let reply = ModelReply::text("Let me check the forecast.")
            .with_part(ReplyPart::ToolUse(invocation("1", "get_forecast")))
            .with_part(ReplyPart::Text("One moment.".into()));

        let turn = Turn::assistant(&reply);
        assert_eq!(turn.role, Role::Assistant);
        assert!(matches!(turn.blocks[0], Block::Text { .. }));
        assert!(matches!(turn.blocks[1], Block::ToolUse(_)));
        assert_eq!(
            turn.text_segments().collect::<Vec<_>>(),
            ["Let me check the forecast.", "One moment."]
        );
    }

    #[test]
    fn reply_accessors_split_parts() {
        let reply = ModelReply::default()
            .with_part(ReplyPart::ToolUse(invocation("a", "search")))
            .with_part(ReplyPart::ToolUse(invocation("b", "read")));
        let names: Vec<_> = reply.tool_requests().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["search", "read"]);
        assert_eq!(reply.text_segments().count(), 0);
        assert!(reply.has_tool_requests());
        assert!(!ModelReply::text("done").has_tool_requests());
    }

    #[test]
    fn tool_result_renders_json_blocks() {
        let result = ToolResult {
            invocation_id: "1".into(),
            content: vec![
                Content::Text("rows: 2".into()),
                Content::Json(serde_json::json!({"quality": 0.91})),
            ],
            is_error: false,
        };
        assert_eq!(result.rendered(), "rows: 2\n{\"quality\":0.91}");
    }

    #[test]
    fn options_validation() {
        assert!(GenerateOptions::default().validate().is_ok());

        let hot = GenerateOptions {
            temperature: Some(1.5),
            ..GenerateOptions::default()
        };
        assert!(matches!(hot.validate(), Err(ModelError::InvalidOptions(_))));

        let empty = GenerateOptions {
            max_tokens: 0,
            ..GenerateOptions::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn spec_from_mcp_tool_defaults_description() {
        let tool = mcp::Tool {
            name: "greet".into(),
            description: None,
            input_schema: serde_json::json!({"type": "object"}),
        };
        let spec = ToolSpec::from(tool);
        assert_eq!(spec.name, "greet");
        assert_eq!(spec.description, "");
    }
}
