//! Error taxonomy for aggregate reporting.
//!
//! Classification is by message content and feeds the monitor's pattern
//! counters only; it never drives control flow.

use serde::{Deserialize, Serialize};

/// Reporting bucket for a recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPattern {
    Timeout,
    Permission,
    RateLimit,
    Network,
    Validation,
    LlmError,
    ToolError,
    Unknown,
}

impl ErrorPattern {
    /// Classify a free-form error message into a reporting bucket.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
            Self::Timeout
        } else if lower.contains("permission")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("access denied")
        {
            Self::Permission
        } else if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("429")
        {
            Self::RateLimit
        } else if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("unreachable")
            || lower.contains("dns")
        {
            Self::Network
        } else if lower.contains("validation")
            || lower.contains("invalid")
            || lower.contains("malformed")
        {
            Self::Validation
        } else if lower.contains("llm") || lower.contains("completion") || lower.contains("model") {
            Self::LlmError
        } else if lower.contains("tool") {
            Self::ToolError
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::LlmError => "llm_error",
            Self::ToolError => "tool_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
