//! The bounded think/act cycle.

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::classifier::{Decision, classify_response};
use super::events::AgentResult;
use super::executor::ReasoningAgent;
use crate::client::{CompletionRequest, CompletionResponse};
use crate::monitor::{ExecutionContext, ExecutionStatus, StepKind};
use crate::types::Message;

/// One piece of tool-derived output with its confidence weight.
struct Evidence {
    tool: String,
    data: Value,
    confidence: f64,
}

/// What the loop produced before final aggregation.
struct LoopOutcome {
    answer: String,
    evidence: Vec<Evidence>,
    tools_used: Vec<String>,
    iterations: usize,
    total_tokens: u64,
    total_cost: f64,
    iteration_capped: bool,
}

impl ReasoningAgent {
    /// Run one task end to end: register it with the monitor, drive the
    /// reasoning loop, and finalize the trace.
    ///
    /// Iteration-cap exhaustion is a *success* at reduced confidence; a tool
    /// failure aborts the task and the trace finishes `Failed`.
    #[instrument(skip(self, context), fields(execution_id = %context.execution_id, agent_id = %self.agent_id))]
    pub async fn run(&self, context: ExecutionContext) -> crate::Result<AgentResult> {
        let execution_id = context.execution_id.clone();
        self.monitor.start_execution(context.clone());
        self.monitor
            .update_execution_status(&execution_id, ExecutionStatus::Starting, None);

        if let Some(step_id) = self.monitor.start_execution_step(
            &execution_id,
            StepKind::Initialization,
            "initialize",
            Some(context.input.clone()),
        ) {
            self.monitor
                .complete_execution_step(&execution_id, &step_id, None, None, 0.0, 0, None);
        }

        self.monitor
            .update_execution_status(&execution_id, ExecutionStatus::Running, None);
        info!(max_iterations = self.config.max_iterations, "Starting reasoning loop");

        match self.run_loop(&context).await {
            Ok(outcome) => {
                let confidence = final_confidence(&outcome, self.config.capped_confidence);
                let result = self.aggregate(&execution_id, outcome, confidence);
                self.monitor.complete_execution(
                    &execution_id,
                    Some(result.output.clone()),
                    Some(confidence),
                    Some(
                        [
                            ("iterations".to_string(), json!(result.iterations)),
                            (
                                "iteration_capped".to_string(),
                                json!(result.iteration_capped),
                            ),
                        ]
                        .into(),
                    ),
                );
                info!(
                    iterations = result.iterations,
                    evidence = result.evidence_count,
                    confidence,
                    "Reasoning loop finished"
                );
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Reasoning loop aborted");
                let already_recorded = self
                    .monitor
                    .get_execution_trace(&execution_id)
                    .is_some_and(|t| t.error.is_some());
                if !already_recorded {
                    self.monitor.record_error(&execution_id, &message, None);
                }
                self.monitor
                    .complete_execution(&execution_id, None, None, None);
                Err(e)
            }
        }
    }

    async fn run_loop(&self, context: &ExecutionContext) -> crate::Result<LoopOutcome> {
        let execution_id = &context.execution_id;
        let system = self.prompts.build(
            &self.agent_type,
            &self.agent_id,
            &self.tools.descriptions(),
            &context.metadata,
        );
        let task_text = match &context.input {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        let mut history: Vec<Message> = Vec::new();
        let mut evidence: Vec<Evidence> = Vec::new();
        let mut tools_used: Vec<String> = Vec::new();
        let mut total_tokens = 0u64;
        let mut total_cost = 0.0f64;
        let mut last_content = String::new();

        for iteration in 1..=self.config.max_iterations {
            debug!(iteration, "Starting iteration");

            // First iteration sends the raw task input; later iterations send
            // only the rolling history tail.
            let mut messages = vec![Message::system(&system)];
            if iteration == 1 {
                messages.push(Message::user(&task_text));
            } else {
                let tail_start = history.len().saturating_sub(self.config.history_window);
                messages.extend(history[tail_start..].iter().cloned());
            }

            let response = self.request_completion(execution_id, iteration, messages).await;
            let cost = response.total_tokens as f64 * self.config.token_cost;
            total_tokens += response.total_tokens;
            total_cost += cost;
            last_content = response.content.clone();
            history.push(Message::assistant(&response.content));

            match classify_response(&response, &self.tools) {
                Decision::FinalAnswer(answer) => {
                    debug!(iteration, "Final answer detected");
                    return Ok(LoopOutcome {
                        answer,
                        evidence,
                        tools_used,
                        iterations: iteration,
                        total_tokens,
                        total_cost,
                        iteration_capped: false,
                    });
                }
                Decision::ToolCall { name, parameters } => {
                    let data = self
                        .invoke_tool(execution_id, &name, parameters, &mut history)
                        .await?;
                    if !tools_used.contains(&name) {
                        tools_used.push(name.clone());
                    }
                    evidence.push(Evidence {
                        tool: name,
                        data,
                        confidence: self.config.evidence_confidence,
                    });
                }
                Decision::Continue => {
                    debug!(iteration, "No terminal signal, continuing");
                }
            }
        }

        debug!(
            max_iterations = self.config.max_iterations,
            "Iteration budget exhausted"
        );
        Ok(LoopOutcome {
            answer: last_content,
            evidence,
            tools_used,
            iterations: self.config.max_iterations,
            total_tokens,
            total_cost,
            iteration_capped: true,
        })
    }

    /// One completion request, reported as a step. A backend failure
    /// degrades to a canned in-band response so the loop can still decide to
    /// terminate gracefully.
    async fn request_completion(
        &self,
        execution_id: &str,
        iteration: usize,
        messages: Vec<Message>,
    ) -> CompletionResponse {
        let step_id = self.monitor.start_execution_step(
            execution_id,
            StepKind::LlmRequest,
            format!("llm_request_{iteration}"),
            None,
        );
        self.monitor
            .update_execution_status(execution_id, ExecutionStatus::WaitingLlm, None);

        let request = CompletionRequest {
            messages,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            tools: self.tools.descriptors(),
        };
        let response = match self.client.complete_with_tools(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(iteration, error = %e, "Completion request failed, degrading in-band");
                CompletionResponse::degraded(&self.config.model)
            }
        };

        if let Some(step_id) = step_id {
            self.monitor.complete_execution_step(
                execution_id,
                &step_id,
                Some(json!({
                    "content": response.content,
                    "provider": response.provider,
                })),
                None,
                response.total_tokens as f64 * self.config.token_cost,
                response.total_tokens,
                None,
            );
        }
        self.monitor
            .update_execution_status(execution_id, ExecutionStatus::Running, None);
        response
    }

    /// One tool invocation, reported as a step. Failures are recorded on the
    /// trace and re-raised; tool results are load-bearing, unlike a single
    /// completion attempt.
    async fn invoke_tool(
        &self,
        execution_id: &str,
        name: &str,
        parameters: Value,
        history: &mut Vec<Message>,
    ) -> crate::Result<Value> {
        self.monitor
            .update_execution_status(execution_id, ExecutionStatus::ToolCalling, None);
        let step_id = self.monitor.start_execution_step(
            execution_id,
            StepKind::ToolCall,
            name,
            Some(parameters.clone()),
        );
        history.push(Message::assistant(format!(
            "Calling tool {name} with {parameters}"
        )));

        let error = match self.tools.invoke(name, parameters).await {
            Ok(outcome) if outcome.success => {
                if let Some(step_id) = &step_id {
                    self.monitor.complete_execution_step(
                        execution_id,
                        step_id,
                        Some(outcome.data.clone()),
                        None,
                        0.0,
                        0,
                        Some(self.config.evidence_confidence),
                    );
                }
                history.push(Message::tool(format!(
                    "Result from {name}: {}",
                    outcome.data
                )));
                self.monitor
                    .update_execution_status(execution_id, ExecutionStatus::Running, None);
                return Ok(outcome.data);
            }
            Ok(outcome) => crate::Error::tool(
                name,
                outcome
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string()),
            ),
            Err(e) => e,
        };

        let message = error.to_string();
        if let Some(step_id) = step_id {
            self.monitor.complete_execution_step(
                execution_id,
                &step_id,
                None,
                Some(message),
                0.0,
                0,
                None,
            );
        } else {
            self.monitor.record_error(execution_id, &message, None);
        }
        Err(error)
    }

    fn aggregate(
        &self,
        execution_id: &str,
        outcome: LoopOutcome,
        confidence: f64,
    ) -> AgentResult {
        let evidence: Vec<Value> = outcome
            .evidence
            .iter()
            .map(|e| {
                json!({
                    "tool": e.tool,
                    "data": e.data,
                    "confidence": e.confidence,
                })
            })
            .collect();

        AgentResult {
            execution_id: execution_id.to_string(),
            output: json!({
                "answer": outcome.answer,
                "evidence": evidence,
                "tools_used": outcome.tools_used,
            }),
            answer: outcome.answer,
            evidence_count: outcome.evidence.len(),
            tools_used: outcome.tools_used,
            confidence,
            iterations: outcome.iterations,
            total_tokens: outcome.total_tokens,
            total_cost: outcome.total_cost,
            iteration_capped: outcome.iteration_capped,
        }
    }
}

/// Mean confidence across evidence (0.5 with none); capped runs are clamped
/// to the configured ceiling.
fn final_confidence(outcome: &LoopOutcome, cap: f64) -> f64 {
    let base = if outcome.evidence.is_empty() {
        0.5
    } else {
        outcome.evidence.iter().map(|e| e.confidence).sum::<f64>() / outcome.evidence.len() as f64
    };
    if outcome.iteration_capped {
        base.min(cap)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(confidences: &[f64], capped: bool) -> LoopOutcome {
        LoopOutcome {
            answer: String::new(),
            evidence: confidences
                .iter()
                .map(|c| Evidence {
                    tool: "t".to_string(),
                    data: Value::Null,
                    confidence: *c,
                })
                .collect(),
            tools_used: Vec::new(),
            iterations: 1,
            total_tokens: 0,
            total_cost: 0.0,
            iteration_capped: capped,
        }
    }

    #[test]
    fn test_confidence_defaults_without_evidence() {
        assert!((final_confidence(&outcome(&[], false), 0.7) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_is_mean_of_evidence() {
        assert!((final_confidence(&outcome(&[0.6, 1.0], false), 0.7) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_capped_confidence_ceiling() {
        assert!((final_confidence(&outcome(&[0.9, 0.9], true), 0.7) - 0.7).abs() < 1e-9);
        // Already below the ceiling stays untouched.
        assert!((final_confidence(&outcome(&[0.4], true), 0.7) - 0.4).abs() < 1e-9);
    }
}
