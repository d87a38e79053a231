//! Conversation types and the model gateway trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Block, Content, GenerateOptions, ModelGateway, ModelReply, ModelRequest, ReplyPart, Role,
    StopReason, ToolInvocation, ToolResult, ToolSpec, Turn, Usage,
};
