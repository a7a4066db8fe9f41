//! System-prompt generation seam.

use std::collections::HashMap;

use serde_json::Value;

/// Builds the system prompt sent on every completion request.
///
/// Implementations are pure string assembly; the runtime passes the agent
/// identity, the catalog of tool descriptions, and the task metadata.
pub trait SystemPromptBuilder: Send + Sync {
    fn build(
        &self,
        agent_type: &str,
        agent_name: &str,
        tool_descriptions: &[String],
        context: &HashMap<String, Value>,
    ) -> String;
}

/// Default template used when no custom builder is supplied.
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptBuilder;

impl SystemPromptBuilder for DefaultPromptBuilder {
    fn build(
        &self,
        agent_type: &str,
        agent_name: &str,
        tool_descriptions: &[String],
        context: &HashMap<String, Value>,
    ) -> String {
        let mut prompt = format!(
            "You are {agent_name}, an autonomous {agent_type} analysis agent.\n\
             Work step by step. When you have gathered enough evidence, start \
             your reply with \"Final answer:\" followed by your conclusion.\n\
             To call a tool, reply with a JSON object of the form \
             {{\"tool_call\": {{\"name\": \"...\", \"parameters\": {{...}}}}}}."
        );

        if !tool_descriptions.is_empty() {
            prompt.push_str("\n\nAvailable tools:\n");
            for desc in tool_descriptions {
                prompt.push_str("- ");
                prompt.push_str(desc);
                prompt.push('\n');
            }
        }

        if !context.is_empty() {
            let mut keys: Vec<_> = context.keys().collect();
            keys.sort();
            prompt.push_str("\nTask context:\n");
            for key in keys {
                prompt.push_str(&format!("- {}: {}\n", key, context[key]));
            }
        }

        prompt
    }
}
