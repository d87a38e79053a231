//! Turns a finished conversation into the user-facing answer.

use crate::model::{Block, Role, Turn};

/// Join the text of every assistant turn, one segment per line.
pub fn render_answer(turns: &[Turn]) -> String {
    turns
        .iter()
        .filter(|turn| turn.role == Role::Assistant)
        .flat_map(Turn::text_segments)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`render_answer`], with a `[Calling tool ...]` line for each tool
/// request in the order the model made them.
pub fn render_transcript(turns: &[Turn]) -> String {
    let mut lines = Vec::new();
    for block in turns
        .iter()
        .filter(|turn| turn.role == Role::Assistant)
        .flat_map(|turn| &turn.blocks)
    {
        match block {
            Block::Text { text } if !text.trim().is_empty() => lines.push(text.trim().to_string()),
            Block::ToolUse(call) => lines.push(format!(
                "[Calling tool {} with args {}]",
                call.name,
                serde_json::Value::Object(call.arguments.clone())
            )),
            _ => {}
        }
    }
    lines.join("\n")
}
