//! The agent's reasoning schema ("working memory").
//!
//! The model replaces this record wholesale on every successful cycle and the
//! client sends it back verbatim on the next one, so it is stored as the raw
//! JSON object. Typed accessors read the few fields the client acts on:
//! `mode`, `mode_transitions` and `chain.steps`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const INITIAL_SCHEMA_TEMPLATE: &str = include_str!("../templates/agent_schema.json");

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentSchema(Map<String, Value>);

/// One declared `from -> to` rule. Entries without both ends are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl AgentSchema {
    /// Wrap a JSON value; `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Current operating mode, empty when the model left it out.
    pub fn mode(&self) -> &str {
        self.0.get("mode").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn mode_transitions(&self) -> Vec<ModeTransition<'_>> {
        self.array("mode_transitions")
            .iter()
            .filter_map(|rule| {
                Some(ModeTransition {
                    from: rule.get("from")?.as_str()?,
                    to: rule.get("to")?.as_str()?,
                })
            })
            .collect()
    }

    /// Number of plan steps still marked `pending`.
    pub fn pending_steps(&self) -> usize {
        self.0
            .get("chain")
            .and_then(|chain| chain.get("steps"))
            .and_then(Value::as_array)
            .map_or(0, |steps| {
                steps
                    .iter()
                    .filter(|step| step.get("status").and_then(Value::as_str) == Some("pending"))
                    .count()
            })
    }

    /// Raw field access for anything the client does not interpret.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Pretty-printed JSON as embedded into the system instruction.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn array(&self, key: &str) -> &[Value] {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Reasoning state every session starts from (mode `ANALYSIS`).
pub fn initial_schema() -> AgentSchema {
    serde_json::from_str(INITIAL_SCHEMA_TEMPLATE)
        .expect("embedded agent schema template should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initial_schema_starts_in_analysis() {
        let schema = initial_schema();
        assert_eq!(schema.mode(), "ANALYSIS");
        assert_eq!(schema.mode_transitions().len(), 3);
        assert_eq!(
            schema.mode_transitions()[0],
            ModeTransition {
                from: "ANALYSIS",
                to: "CONTENT_GENERATION"
            }
        );
        assert_eq!(
            schema.get("wm").and_then(|wm| wm.pointer("/pr/current/0")),
            Some(&json!("Understand project scope"))
        );
    }

    /// Nested fields the client has no notion of come back unchanged.
    #[test]
    fn nested_unknown_fields_survive_round_trip() {
        let raw = json!({
            "mode": "REFINEMENT",
            "wm": { "ctx": { "audience": "dentists" }, "priority": "high" },
            "chain": { "steps": [{ "step": "write README", "status": "in_progress", "owner": "agent" }] },
            "mode_transitions": [{ "from": "REFINEMENT", "to": "ANALYSIS" }],
            "logic": { "propos": ["plain", { "symb": "P", "nl": "docs exist", "weight": 2 }] },
            "confidence": 0.8
        });
        let schema: AgentSchema = serde_json::from_value(raw.clone()).expect("parse");
        let back: Value =
            serde_json::from_str(&schema.to_pretty_json().expect("pretty")).expect("reparse");
        assert_eq!(back, raw);
        assert_eq!(schema.mode_transitions().len(), 1);
        assert_eq!(schema.pending_steps(), 0);
    }

    #[test]
    fn accessors_tolerate_missing_fields() {
        let schema = AgentSchema::from_value(json!({
            "mode_transitions": [{ "from": "A" }, "junk"],
            "chain": { "steps": [{ "step": "no status" }] }
        }))
        .expect("object");
        assert_eq!(schema.mode(), "");
        assert!(schema.mode_transitions().is_empty());
        assert_eq!(schema.pending_steps(), 0);
        assert_eq!(AgentSchema::from_value(json!([1, 2])), None);
    }

    #[test]
    fn pending_steps_counts_only_pending() {
        let schema = AgentSchema::from_value(json!({
            "chain": { "steps": [
                { "step": "a", "status": "completed" },
                { "step": "b", "status": "pending" },
                { "step": "c", "status": "failed" }
            ] }
        }))
        .expect("object");
        assert_eq!(schema.pending_steps(), 1);
    }
}
