//! Model service adapters.
//!
//! Each provider implements [`ModelGateway`](crate::model::ModelGateway) for
//! its specific API.

mod anthropic;

pub use anthropic::{AnthropicGateway, AnthropicGatewayBuilder};
