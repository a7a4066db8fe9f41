//! Execution traces: per-task status, steps, and running totals.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::ExecutionContext;

/// Lifecycle state of one execution.
///
/// `Running`, `ToolCalling`, and `WaitingLlm` may alternate any number of
/// times; the four terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Queued,
    Starting,
    Running,
    ToolCalling,
    WaitingLlm,
    Completing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

/// Kind of work a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Initialization,
    LlmRequest,
    ToolCall,
    Processing,
    Completion,
}

/// Status of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

/// One unit of work inside an execution. Created when work begins, sealed
/// when it finishes, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step_id: String,
    pub execution_id: String,
    pub kind: StepKind,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cost: f64,
    pub tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ExecutionStep {
    pub(crate) fn new(
        execution_id: &str,
        kind: StepKind,
        name: impl Into<String>,
        input: Option<Value>,
    ) -> Self {
        Self {
            step_id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.to_string(),
            kind,
            name: name.into(),
            started_at: Utc::now(),
            ended_at: None,
            status: StepStatus::Running,
            input,
            output: None,
            error: None,
            cost: 0.0,
            tokens: 0,
            confidence: None,
        }
    }

    pub(crate) fn seal(&mut self, status: StepStatus) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
            self.status = status;
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Aggregate record of one execution: context, status, ordered steps, and
/// running totals. Mutated in place by the owning monitor, relocated to the
/// completed history once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub context: ExecutionContext,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub steps: Vec<ExecutionStep>,
    /// Index into `steps` of the currently open step.
    pub open_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub total_cost: f64,
    pub total_tokens: u64,
    /// Distinct tool names invoked, in first-use order.
    pub tools_used: Vec<String>,
    pub llm_requests: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, Value>,
}

impl ExecutionTrace {
    pub(crate) fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            status: ExecutionStatus::Queued,
            started_at: Utc::now(),
            ended_at: None,
            steps: Vec::new(),
            open_step: None,
            result: None,
            error: None,
            total_cost: 0.0,
            total_tokens: 0,
            tools_used: Vec::new(),
            llm_requests: 0,
            confidence: None,
            metrics: HashMap::new(),
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.context.execution_id
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Seal the currently open step, if any. Starting a new step and every
    /// terminal transition go through here, which is what keeps the
    /// one-open-step invariant.
    pub(crate) fn seal_open_step(&mut self, status: StepStatus) {
        if let Some(idx) = self.open_step.take() {
            self.steps[idx].seal(status);
        }
    }

    /// Open a new step, sealing the previous one as completed.
    pub(crate) fn open_step(
        &mut self,
        kind: StepKind,
        name: impl Into<String>,
        input: Option<Value>,
    ) -> String {
        self.seal_open_step(StepStatus::Completed);
        let step = ExecutionStep::new(&self.context.execution_id, kind, name, input);
        let step_id = step.step_id.clone();
        self.steps.push(step);
        self.open_step = Some(self.steps.len() - 1);
        step_id
    }

    pub(crate) fn step_mut(&mut self, step_id: &str) -> Option<&mut ExecutionStep> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }

    /// Roll a sealed step's cost/token figures into the trace totals and
    /// update the tool / LLM-request counters.
    pub(crate) fn absorb_step_totals(&mut self, step_id: &str) {
        let Some(step) = self.steps.iter().find(|s| s.step_id == step_id) else {
            return;
        };
        self.total_cost += step.cost;
        self.total_tokens += step.tokens;
        match step.kind {
            StepKind::LlmRequest => self.llm_requests += 1,
            StepKind::ToolCall => {
                if !self.tools_used.contains(&step.name) {
                    self.tools_used.push(step.name.clone());
                }
            }
            _ => {}
        }
    }

    pub fn running_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Running)
            .count()
    }
}
