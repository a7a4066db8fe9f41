//! Response classification and free-text tool selection.
//!
//! Pure functions, kept separate from the state machine so the heuristics
//! can be unit-tested and swapped in isolation. Tool selection from free
//! text is a best-effort keyword match and can pick an unrelated tool or
//! none; that imprecision is long-standing documented behavior, not a bug.

use serde_json::Value;

use crate::client::CompletionResponse;
use crate::tools::ToolRegistry;

/// Phrases that frame a response as a terminal result.
const FINAL_MARKERS: [&str; 3] = ["final answer:", "conclusion:", "summary:"];

/// Phrases that signal intent to use a tool without a structured payload.
const INTENT_MARKERS: [&str; 7] = [
    "i will use",
    "let me use",
    "i need to use",
    "using the",
    "i'll call",
    "let me check",
    "let me search",
];

/// What the loop should do with a completion response.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Terminate successfully with this content as the answer.
    FinalAnswer(String),
    /// Invoke the named tool, then continue.
    ToolCall { name: String, parameters: Value },
    /// No signal either way; run another iteration.
    Continue,
}

/// Layered classification: structured tool-call payload first, then
/// result-framing phrases, then free-text tool intent.
pub fn classify_response(response: &CompletionResponse, registry: &ToolRegistry) -> Decision {
    if let Some(call) = response.tool_call() {
        return Decision::ToolCall {
            name: call.name,
            parameters: call.parameters,
        };
    }

    let lower = response.content.to_lowercase();
    if FINAL_MARKERS.iter().any(|m| lower.contains(m)) {
        return Decision::FinalAnswer(response.content.clone());
    }

    if INTENT_MARKERS.iter().any(|m| lower.contains(m))
        && let Some(name) = select_tool(&response.content, registry)
    {
        let parameters = registry
            .get(&name)
            .map(|tool| default_parameters(&tool.input_schema()))
            .unwrap_or_else(|| Value::Object(Default::default()));
        return Decision::ToolCall { name, parameters };
    }

    Decision::Continue
}

/// Best-effort keyword match from free text to a registered tool.
///
/// Scores each tool by how many of its name fragments and description words
/// appear in the text; ties go to the lexically smaller name so selection is
/// deterministic.
pub fn select_tool(text: &str, registry: &ToolRegistry) -> Option<String> {
    let lower = text.to_lowercase();
    let mut best: Option<(usize, String)> = None;

    for name in registry.names() {
        let tool = registry.get(&name)?;
        let mut score = 0usize;

        for fragment in name.split(['_', '-']).filter(|f| f.len() > 2) {
            if lower.contains(&fragment.to_lowercase()) {
                score += 2;
            }
        }
        for word in tool
            .description()
            .split_whitespace()
            .filter(|w| w.len() > 3)
        {
            if lower.contains(&word.to_lowercase()) {
                score += 1;
            }
        }

        if score > 0 {
            let better = match &best {
                None => true,
                Some((best_score, best_name)) => {
                    score > *best_score || (score == *best_score && name < *best_name)
                }
            };
            if better {
                best = Some((score, name));
            }
        }
    }

    best.map(|(_, name)| name)
}

/// Synthesize default parameters for a tool from its JSON schema: declared
/// defaults where present, type-appropriate zero values otherwise.
pub fn default_parameters(schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(Default::default());
    };

    let mut parameters = serde_json::Map::new();
    for (key, prop) in properties {
        let value = prop.get("default").cloned().unwrap_or_else(|| {
            match prop.get("type").and_then(Value::as_str) {
                Some("string") => Value::String(String::new()),
                Some("integer") | Some("number") => Value::from(0),
                Some("boolean") => Value::Bool(false),
                Some("array") => Value::Array(Vec::new()),
                _ => Value::Null,
            }
        });
        parameters.insert(key.clone(), value);
    }
    Value::Object(parameters)
}
