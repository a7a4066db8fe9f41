//! # agent-runtime
//!
//! Runtime for driving autonomous, LLM-backed analysis tasks through a
//! bounded reasoning loop, with a supervisory [`ExecutionMonitor`] that
//! tracks every in-flight task, its step-level trace, and aggregate
//! statistics.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agent_runtime::{AgentConfig, ExecutionMonitor, Priority, ReasoningAgent};
//! # use agent_runtime::client::CompletionClient;
//! # fn completion_client() -> Arc<dyn CompletionClient> { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agent_runtime::Error> {
//!     let monitor = Arc::new(ExecutionMonitor::default());
//!     let agent = ReasoningAgent::builder()
//!         .client(completion_client())
//!         .monitor(Arc::clone(&monitor))
//!         .agent("research-1", "research")
//!         .build()?;
//!
//!     let context = monitor.create_execution_context(
//!         "research-1",
//!         "research",
//!         "tenant-a",
//!         "operator",
//!         serde_json::json!({"task": "summarize quarterly churn"}),
//!         Priority::Normal,
//!     );
//!     let result = agent.run(context).await?;
//!     println!("confidence: {}", result.confidence);
//!     Ok(())
//! }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod agent;
pub mod client;
pub mod monitor;
pub mod prompts;
pub mod tools;
pub mod types;

// Re-exports for convenience
pub use agent::{
    AgentBuilder, AgentConfig, AgentResult, Decision, ReasoningAgent, classify_response,
    select_tool,
};
pub use client::{CompletionClient, CompletionRequest, CompletionResponse};
pub use monitor::{
    AgentPerformance, ErrorPattern, ExecutionContext, ExecutionMonitor, ExecutionStatistics,
    ExecutionStatus, ExecutionStep, ExecutionTrace, MonitorConfig, Priority, StepKind, StepStatus,
    TimeRange,
};
pub use prompts::{DefaultPromptBuilder, SystemPromptBuilder};
pub use tools::{Tool, ToolOutcome, ToolRegistry};
pub use types::{Message, Role};

/// Error type for agent-runtime operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Completion backend returned an error response.
    #[error("Completion request failed: {message}")]
    Completion { message: String },

    /// Tool execution failed.
    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    /// Requested tool is not registered.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Referenced execution is not tracked by the monitor.
    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    /// Operation exceeded its wall-clock timeout.
    #[error("Operation timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),

    /// Execution was cancelled by an external supervisor.
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    /// Request parameters or task input are invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn completion(message: impl Into<String>) -> Self {
        Error::Completion {
            message: message.into(),
        }
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the enclosing task can keep making progress after this error.
    ///
    /// Completion failures degrade to an in-band canned response; tool
    /// failures are load-bearing and abort the task.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Completion { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::Tool { .. } | Error::Timeout(_) | Error::Cancelled(_)
        )
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::completion("backend down").to_string(),
            "Completion request failed: backend down"
        );
        assert_eq!(
            Error::tool("search", "boom").to_string(),
            "Tool 'search' failed: boom"
        );
        assert_eq!(
            Error::UnknownTool("missing".into()).to_string(),
            "Unknown tool: missing"
        );
        assert_eq!(
            Error::UnknownExecution("agent-1-0-0".into()).to_string(),
            "Unknown execution: agent-1-0-0"
        );
        assert_eq!(
            Error::Timeout(std::time::Duration::from_secs(30)).to_string(),
            "Operation timed out after 30.0s"
        );
        assert_eq!(
            Error::Cancelled("operator request".into()).to_string(),
            "Execution cancelled: operator request"
        );
        assert_eq!(
            Error::InvalidInput("empty task".into()).to_string(),
            "Invalid input: empty task"
        );
        assert_eq!(
            Error::Config("client missing".into()).to_string(),
            "Configuration error: client missing"
        );
    }

    #[test]
    fn test_recoverable_and_terminal() {
        // Only a failed completion can be absorbed in-band.
        assert!(Error::completion("x").is_recoverable());
        assert!(!Error::tool("t", "x").is_recoverable());
        assert!(!Error::InvalidInput("x".into()).is_recoverable());

        assert!(Error::tool("t", "x").is_terminal());
        assert!(Error::Timeout(std::time::Duration::from_secs(1)).is_terminal());
        assert!(Error::Cancelled("x".into()).is_terminal());
        assert!(!Error::completion("x").is_terminal());
        assert!(!Error::UnknownExecution("x".into()).is_terminal());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{broken")
            .err()
            .map(Into::into)
            .unwrap();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().starts_with("JSON parsing failed"));
    }
}
