//! Anthropic Messages API gateway.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{
    Block, ModelError, ModelGateway, ModelReply, ModelRequest, ReplyPart, Role, StopReason,
    ToolInvocation, ToolSpec, Turn, Usage,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Sent in place of a turn whose text is all blank.
const EMPTY_TEXT: &str = "(no content)";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: ApiContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiContent {
    Text(String),
    Blocks(Vec<ApiContentBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ApiTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiResponseBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for an [`AnthropicGateway`].
#[derive(Debug, Clone)]
pub struct AnthropicGatewayBuilder {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicGatewayBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the endpoint, e.g. for a proxy.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// HTTP-level timeout for one request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AnthropicGateway, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ModelError::Network(e.to_string()))?;

        Ok(AnthropicGateway {
            client,
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            timeout: self.timeout,
        })
    }
}

/// Model gateway for the Anthropic Messages API.
pub struct AnthropicGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl AnthropicGateway {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> AnthropicGatewayBuilder {
        AnthropicGatewayBuilder::new(api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User | Role::ToolResult => "user",
            Role::Assistant => "assistant",
        }
    }

    fn turn_to_api(turn: &Turn) -> ApiMessage {
        // The API rejects empty and whitespace-only text blocks.
        let mut blocks: Vec<_> = turn
            .blocks
            .iter()
            .filter_map(|block| match block {
                Block::Text { text } if text.trim().is_empty() => None,
                Block::Text { text } => Some(ApiContentBlock::Text { text: text.clone() }),
                Block::ToolUse(call) => Some(ApiContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                }),
                Block::ToolResult(result) => Some(ApiContentBlock::ToolResult {
                    tool_use_id: result.invocation_id.clone(),
                    content: result.rendered(),
                    is_error: result.is_error,
                }),
            })
            .collect();

        let content = if blocks.is_empty() {
            ApiContent::Text(EMPTY_TEXT.to_string())
        } else if let [ApiContentBlock::Text { text }] = blocks.as_mut_slice() {
            ApiContent::Text(std::mem::take(text))
        } else {
            ApiContent::Blocks(blocks)
        };

        ApiMessage {
            role: Self::role_to_api(turn.role),
            content,
        }
    }

    fn tool_to_api(spec: &ToolSpec) -> ApiTool<'_> {
        ApiTool {
            name: &spec.name,
            description: &spec.description,
            input_schema: &spec.input_schema,
        }
    }

    fn build_request<'a>(&'a self, request: ModelRequest<'a>) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            max_tokens: request.options.max_tokens,
            messages: request.turns.iter().map(Self::turn_to_api).collect(),
            system: request.options.system.as_deref(),
            temperature: request.options.temperature,
            tools: request.tools.iter().map(Self::tool_to_api).collect(),
        }
    }

    fn response_to_reply(response: ApiResponse) -> ModelReply {
        let parts = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiResponseBlock::Text { text } => Some(ReplyPart::Text(text)),
                ApiResponseBlock::ToolUse { id, name, input } => {
                    Some(ReplyPart::ToolUse(ToolInvocation {
                        id,
                        name,
                        arguments: input,
                    }))
                }
                ApiResponseBlock::Unknown => None,
            })
            .collect();

        ModelReply {
            parts,
            usage: Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
            stop_reason: parse_stop_reason(response.stop_reason.as_deref()),
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> ModelError {
        if err.is_timeout() {
            ModelError::Timeout(self.timeout)
        } else {
            ModelError::Network(err.to_string())
        }
    }
}

fn parse_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        None | Some("end_turn") | Some("stop_sequence") => StopReason::EndTurn,
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        Some(other) => StopReason::Other(other.to_string()),
    }
}

fn status_error(status: StatusCode, body: String) -> ModelError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ModelError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => ModelError::RateLimited(body),
        _ => ModelError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

impl std::fmt::Display for AnthropicGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anthropic({})", self.model)
    }
}

impl ModelGateway for AnthropicGateway {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        request.options.validate()?;
        let api_request = self.build_request(request);
        debug!(
            model = %self.model,
            messages = api_request.messages.len(),
            tools = api_request.tools.len(),
            "sending model request"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        if !status.is_success() {
            return Err(status_error(status, body));
        }

        let api_response: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let reply = Self::response_to_reply(api_response);
        debug!(
            stop_reason = ?reply.stop_reason,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "model replied"
        );
        Ok(reply)
    }
}
