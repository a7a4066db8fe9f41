//! Completion-client seam.
//!
//! The runtime never talks to a model backend directly; it only depends on
//! the [`CompletionClient`] trait. Real adapters (HTTP providers, gateways)
//! live outside this crate, and tests script the trait with stubs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Message;

/// Canned content returned when the completion backend fails and the loop
/// degrades in-band instead of aborting the task.
pub const DEGRADED_CONTENT: &str =
    "I apologize, but I was unable to reach the completion backend for this \
     step. Based on the information gathered so far, summary: no further \
     reasoning is available.";

/// Parameters for one completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Tool catalog offered to the backend, empty for plain completions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDescriptor>,
}

/// Wire-agnostic description of a callable tool, as advertised to the
/// completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Structured response from a completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub total_tokens: u64,
    pub provider: String,
    pub model: String,
}

impl CompletionResponse {
    /// Degraded in-band response used when the backend call fails. Zero
    /// token estimate, so totals stay honest.
    pub fn degraded(model: impl Into<String>) -> Self {
        Self {
            content: DEGRADED_CONTENT.to_string(),
            total_tokens: 0,
            provider: "degraded".to_string(),
            model: model.into(),
        }
    }

    /// Extract a structured tool-call request embedded in `content`, if any.
    ///
    /// Backends that support tool use embed a JSON object of the shape
    /// `{"tool_call": {"name": "...", "parameters": {...}}}`. The whole
    /// content may be that object, or it may be wrapped in surrounding text
    /// on its own line.
    pub fn tool_call(&self) -> Option<ToolCallRequest> {
        let parse = |text: &str| -> Option<ToolCallRequest> {
            let value: Value = serde_json::from_str(text.trim()).ok()?;
            let call = value.get("tool_call")?;
            Some(ToolCallRequest {
                name: call.get("name")?.as_str()?.to_string(),
                parameters: call
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            })
        };

        parse(&self.content).or_else(|| self.content.lines().find_map(parse))
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub parameters: Value,
}

/// Text-generation backend consumed by the reasoning loop.
///
/// Both methods are opaque blocking points from the loop's perspective; the
/// runtime does not inspect adapter-internal concurrency or retries.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send a transcript and return the model's response.
    async fn complete(&self, request: CompletionRequest) -> crate::Result<CompletionResponse>;

    /// Tools-aware variant. The default implementation forwards to
    /// [`complete`](Self::complete); adapters that support native tool use
    /// override it.
    async fn complete_with_tools(
        &self,
        request: CompletionRequest,
    ) -> crate::Result<CompletionResponse> {
        self.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> CompletionResponse {
        CompletionResponse {
            content: content.to_string(),
            total_tokens: 42,
            provider: "test".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn test_tool_call_extraction() {
        let resp = response(r#"{"tool_call": {"name": "fetch_data", "parameters": {"id": 7}}}"#);
        let call = resp.tool_call().unwrap();
        assert_eq!(call.name, "fetch_data");
        assert_eq!(call.parameters, serde_json::json!({"id": 7}));
    }

    #[test]
    fn test_tool_call_embedded_line() {
        let resp = response(
            "I will look that up.\n{\"tool_call\": {\"name\": \"search\"}}\nStand by.",
        );
        let call = resp.tool_call().unwrap();
        assert_eq!(call.name, "search");
        assert_eq!(call.parameters, serde_json::json!({}));
    }

    #[test]
    fn test_tool_call_absent() {
        assert!(response("plain prose answer").tool_call().is_none());
        assert!(response(r#"{"other": 1}"#).tool_call().is_none());
    }

    #[test]
    fn test_degraded_response() {
        let resp = CompletionResponse::degraded("test-model");
        assert_eq!(resp.total_tokens, 0);
        assert_eq!(resp.provider, "degraded");
        assert!(resp.content.contains("apologize"));
    }
}
