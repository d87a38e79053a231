//! Scripted model and tool doubles for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Map, json};

use crate::model::{
    ModelError, ModelGateway, ModelReply, ModelRequest, ReplyPart, ToolInvocation, ToolResult,
    ToolSpec, Turn,
};
use crate::tools::{ToolError, ToolHost};

type Script = Box<dyn FnMut(&[Turn]) -> Result<ModelReply, ModelError> + Send>;
type Handler = Box<dyn Fn(&ToolInvocation) -> Result<ToolResult, ToolError> + Send + Sync>;

/// Model double driven by a closure over the conversation so far.
pub struct ScriptedGateway {
    script: Mutex<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_lengths: Mutex<Vec<usize>>,
}

impl ScriptedGateway {
    pub fn new(
        script: impl FnMut(&[Turn]) -> Result<ModelReply, ModelError> + Send + 'static,
    ) -> Self {
        Self {
            script: Mutex::new(Box::new(script)),
            delay: None,
            calls: AtomicUsize::new(0),
            seen_lengths: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order; calls past the end fail.
    pub fn replies(replies: Vec<ModelReply>) -> Self {
        let mut queue = VecDeque::from(replies);
        Self::new(move |_| {
            queue
                .pop_front()
                .ok_or_else(|| ModelError::InvalidResponse("script exhausted".into()))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversation length passed to each call.
    pub fn seen_lengths(&self) -> Vec<usize> {
        self.seen_lengths.lock().unwrap().clone()
    }
}

impl ModelGateway for ScriptedGateway {
    async fn generate(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_lengths.lock().unwrap().push(request.turns.len());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        (*script)(request.turns)
    }
}

/// Tool host double that records every call.
pub struct FakeHost {
    tools: Vec<ToolSpec>,
    handler: Handler,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    listings: AtomicUsize,
}

impl FakeHost {
    /// A host whose tools all answer with their own name.
    pub fn new(names: &[&str]) -> Self {
        Self::with_handler(names, |call| Ok(ToolResult::text(&call.id, &call.name)))
    }

    pub fn with_handler(
        names: &[&str],
        handler: impl Fn(&ToolInvocation) -> Result<ToolResult, ToolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tools: names.iter().map(|name| spec(name)).collect(),
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
            listings: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Names of the tools called, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

impl ToolHost for FakeHost {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, call: &ToolInvocation) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(call.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(call)
    }
}

pub fn spec(name: &str) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: format!("{name} tool"),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

pub fn tool_use(id: &str, name: &str) -> ReplyPart {
    ReplyPart::ToolUse(ToolInvocation {
        id: id.to_string(),
        name: name.to_string(),
        arguments: Map::new(),
    })
}

/// A reply that only requests `name`.
pub fn request_tool(id: &str, name: &str) -> ModelReply {
    ModelReply::default().with_part(tool_use(id, name))
}
