//! Mode-transition audit.
//!
//! Declared transitions are descriptive: an undeclared transition is reported
//! but never blocks the update.

use crate::reasoning::AgentSchema;

/// Return a warning when `prev.mode -> next.mode` is neither a self-transition
/// nor declared in `prev`'s `mode_transitions`.
pub fn audit_transition(prev: &AgentSchema, next: &AgentSchema) -> Option<String> {
    let (from, to) = (prev.mode(), next.mode());
    if from == to {
        return None;
    }
    let declared = prev
        .mode_transitions()
        .iter()
        .any(|rule| rule.from == from && rule.to == to);
    if declared {
        return None;
    }
    Some(format!("undeclared mode transition {} -> {}", from, to))
}
