//! Append-only conversation history for one query.

use crate::model::{ModelReply, Role, ToolInvocation, ToolResult, Turn};
use crate::{Error, Result};

/// The ordered turns of one query.
///
/// Appends are checked so that every tool request is answered by exactly one
/// result before anything else is added, and no result appears without its
/// request.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    /// Start a conversation with the user's query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(query)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Tool requests of the last turn that still wait for results.
    pub fn pending_invocations(&self) -> Vec<&ToolInvocation> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::Assistant => turn.tool_invocations().collect(),
            _ => Vec::new(),
        }
    }

    /// Append the model's reply.
    pub fn push_assistant(&mut self, reply: &ModelReply) -> Result<()> {
        match self.turns.last().map(|turn| turn.role) {
            Some(Role::User | Role::ToolResult) => {
                self.turns.push(Turn::assistant(reply));
                Ok(())
            }
            Some(Role::Assistant) => Err(Error::InvalidState(
                "assistant turn appended twice in a row".to_string(),
            )),
            None => Err(Error::InvalidState(
                "conversation has no user turn".to_string(),
            )),
        }
    }

    /// Answer every pending request of the last assistant turn, in order.
    pub fn push_tool_results(&mut self, results: Vec<ToolResult>) -> Result<()> {
        let pending = self.pending_invocations();
        if pending.is_empty() {
            return Err(Error::InvalidState(
                "tool results without a preceding tool request".to_string(),
            ));
        }

        let expected: Vec<&str> = pending.iter().map(|call| call.id.as_str()).collect();
        let actual: Vec<&str> = results.iter().map(|r| r.invocation_id.as_str()).collect();
        if expected != actual {
            return Err(Error::InvalidState(format!(
                "tool results {actual:?} do not answer requests {expected:?}"
            )));
        }

        self.turns.push(Turn::tool_results(results));
        Ok(())
    }
}
