//! Aggregate report types backing the observability surface.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::Priority;
use super::errors::ErrorPattern;

/// Half-open time window `[start, end)` used to scope statistics queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering the most recent `duration` up to now.
    pub fn last(duration: chrono::Duration) -> Self {
        let end = Utc::now();
        Self {
            start: end - duration,
            end,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// System-wide snapshot computed from in-memory monitor state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    /// Executions ever submitted in this process.
    pub total_executions: u64,
    /// Currently tracked (non-terminal) executions.
    pub active_executions: usize,
    /// Queue depth per priority bucket.
    pub queued_executions: HashMap<Priority, usize>,
    pub completed_today: u64,
    pub failed_today: u64,
    /// Completed/failed counts inside the queried window (whole retained
    /// history when no window was given).
    pub completed: u64,
    pub failed: u64,
    /// Rolling average over recent completed traces, refreshed periodically.
    pub average_duration_secs: f64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub error_patterns: HashMap<ErrorPattern, u64>,
}

/// Per-agent aggregate over completed executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub executions: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub average_duration_secs: f64,
    pub average_confidence: f64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub tools_used: Vec<String>,
}
