//! Reasoning-loop result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal result of one reasoning-loop run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub execution_id: String,
    /// Accumulated output payload (answer text plus collected evidence).
    pub output: Value,
    pub answer: String,
    pub evidence_count: usize,
    /// Distinct tool names invoked, in first-use order.
    pub tools_used: Vec<String>,
    /// Mean evidence confidence; 0.5 with no evidence, capped at the
    /// configured ceiling when the iteration budget ran out.
    pub confidence: f64,
    pub iterations: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    /// True when the loop stopped on the iteration cap rather than a final
    /// answer.
    pub iteration_capped: bool,
}
