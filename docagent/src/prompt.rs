//! System instruction and turn rendering.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::path::file_paths;
use crate::core::protocol::SENTINEL;
use crate::core::types::Message;
use crate::reasoning::AgentSchema;
use crate::tree::DocNode;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const GEMINI_TURN_TEMPLATE: &str = include_str!("prompts/gemini_turn.md");

/// Synthetic prompt submitted by the continuation loop.
pub const CONTINUE_PROMPT: &str = "Continue with the plan.";

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template("system.md", SYSTEM_TEMPLATE)
        .expect("system template should be valid");
    env.add_template("gemini_turn.md", GEMINI_TURN_TEMPLATE)
        .expect("gemini turn template should be valid");
    env
});

/// Render the operating protocol, the current schema and the file listing.
///
/// `selected_path` is appended as a focus hint when set.
pub fn system_instruction(
    schema: &AgentSchema,
    tree: &DocNode,
    selected_path: Option<&str>,
) -> Result<String> {
    let schema_json = schema.to_pretty_json().context("serialize agent schema")?;
    let file_list = file_paths(tree).join("\n");
    let template = ENGINE.get_template("system.md")?;
    let rendered = template
        .render(context! {
            continue_prompt => CONTINUE_PROMPT,
            separator => SENTINEL,
            schema_json => schema_json,
            file_list => file_list,
            selected_path => selected_path,
        })
        .context("render system instruction")?;
    Ok(rendered)
}

/// `author: content` lines, oldest first.
pub fn history_lines(history: &[Message]) -> String {
    history
        .iter()
        .map(|message| format!("{}: {}", message.author, message.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-turn rendering used by the Gemini adapter.
pub fn gemini_turn(history: &[Message], prompt: &str) -> Result<String> {
    let template = ENGINE.get_template("gemini_turn.md")?;
    let rendered = template
        .render(context! {
            history => history_lines(history),
            prompt => prompt,
        })
        .context("render gemini turn")?;
    Ok(rendered)
}

/// The last `window` messages of `history`.
pub fn window(history: &[Message], window: usize) -> &[Message] {
    &history[history.len().saturating_sub(window)..]
}
