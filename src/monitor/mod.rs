//! Supervisory runtime tracking every task lifecycle.
//!
//! The [`ExecutionMonitor`] is the single shared authority over what is
//! running, what happened, and how the system is performing. All mutable
//! state sits behind one mutex; the lock is held only for in-memory
//! bookkeeping and callbacks fire after it is released.

mod context;
mod errors;
mod stats;
mod trace;

pub use context::{ExecutionContext, Priority};
pub use errors::ErrorPattern;
pub use stats::{AgentPerformance, ExecutionStatistics, TimeRange};
pub use trace::{ExecutionStatus, ExecutionStep, ExecutionTrace, StepKind, StepStatus};

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Callback fired on execution start and every status change.
pub type ExecutionCallback = Arc<dyn Fn(&ExecutionTrace) + Send + Sync>;
/// Callback fired when a step starts or completes.
pub type StepCallback = Arc<dyn Fn(&ExecutionStep) + Send + Sync>;
/// Callback fired when an error is recorded; receives execution id and message.
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Monitor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Completed-trace ring capacity; the oldest entry is evicted first.
    pub history_capacity: usize,
    /// Interval of the rolling-average statistics refresher.
    pub stats_interval: Duration,
    /// Number of recent completed traces the rolling average covers.
    pub stats_window: usize,
    /// How often the housekeeping task checks for local-day rollover.
    pub rollover_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            stats_interval: Duration::from_secs(30),
            stats_window: 100,
            rollover_interval: Duration::from_secs(60),
        }
    }
}

impl MonitorConfig {
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_stats_window(mut self, window: usize) -> Self {
        self.stats_window = window;
        self
    }
}

/// All mutable monitor state, serialized behind one lock for consistent
/// snapshots.
struct MonitorState {
    active: HashMap<String, ExecutionTrace>,
    queues: HashMap<Priority, VecDeque<String>>,
    history: VecDeque<ExecutionTrace>,
    total_executions: u64,
    completed_today: u64,
    failed_today: u64,
    error_patterns: HashMap<ErrorPattern, u64>,
    average_duration_secs: f64,
    today: NaiveDate,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            active: HashMap::new(),
            queues: Priority::ALL
                .iter()
                .map(|p| (*p, VecDeque::new()))
                .collect(),
            history: VecDeque::new(),
            total_executions: 0,
            completed_today: 0,
            failed_today: 0,
            error_patterns: HashMap::new(),
            average_duration_secs: 0.0,
            today: Local::now().date_naive(),
        }
    }

    fn dequeue(&mut self, priority: Priority, execution_id: &str) {
        if let Some(queue) = self.queues.get_mut(&priority) {
            queue.retain(|id| id != execution_id);
        }
    }

    /// Move a trace that just reached a terminal status out of the active
    /// set and into the bounded history ring.
    fn retire(&mut self, execution_id: &str, history_capacity: usize) -> Option<ExecutionTrace> {
        let mut trace = self.active.remove(execution_id)?;
        self.dequeue(trace.context.priority, execution_id);
        trace.ended_at = Some(chrono::Utc::now());

        match trace.status {
            ExecutionStatus::Completed => self.completed_today += 1,
            ExecutionStatus::Failed | ExecutionStatus::TimedOut => self.failed_today += 1,
            _ => {}
        }

        self.history.push_back(trace.clone());
        while self.history.len() > history_capacity {
            self.history.pop_front();
        }
        Some(trace)
    }

    fn refresh_average_duration(&mut self, window: usize) {
        let recent: Vec<f64> = self
            .history
            .iter()
            .rev()
            .take(window)
            .filter_map(ExecutionTrace::duration_secs)
            .collect();
        if !recent.is_empty() {
            self.average_duration_secs = recent.iter().sum::<f64>() / recent.len() as f64;
        }
    }

    fn rollover_if_new_day(&mut self) {
        let today = Local::now().date_naive();
        if today != self.today {
            info!(
                completed = self.completed_today,
                failed = self.failed_today,
                "Daily counters reset"
            );
            self.today = today;
            self.completed_today = 0;
            self.failed_today = 0;
        }
    }
}

/// Shared, thread-safe supervisor over all task executions.
///
/// Safe to call concurrently from any number of submitters and reasoning
/// loops; queries take the same lock as mutations for a consistent view.
pub struct ExecutionMonitor {
    config: MonitorConfig,
    state: Arc<Mutex<MonitorState>>,
    execution_callbacks: Mutex<Vec<ExecutionCallback>>,
    step_callbacks: Mutex<Vec<StepCallback>>,
    error_callbacks: Mutex<Vec<ErrorCallback>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for ExecutionMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl ExecutionMonitor {
    /// Create a monitor and start its background tasks.
    ///
    /// Outside a tokio runtime the periodic refresher and rollover tasks are
    /// skipped; all bookkeeping still works and [`refresh_statistics`]
    /// remains callable.
    ///
    /// [`refresh_statistics`]: Self::refresh_statistics
    pub fn new(config: MonitorConfig) -> Self {
        let monitor = Self {
            config,
            state: Arc::new(Mutex::new(MonitorState::new())),
            execution_callbacks: Mutex::new(Vec::new()),
            step_callbacks: Mutex::new(Vec::new()),
            error_callbacks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            monitor.spawn_background_tasks();
        } else {
            debug!("No tokio runtime; monitor background tasks disabled");
        }
        monitor
    }

    fn spawn_background_tasks(&self) {
        let mut tasks = lock(&self.tasks);

        let state = Arc::clone(&self.state);
        let token = self.shutdown.clone();
        let interval = self.config.stats_interval;
        let window = self.config.stats_window;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => lock(&state).refresh_average_duration(window),
                }
            }
        }));

        let state = Arc::clone(&self.state);
        let token = self.shutdown.clone();
        let interval = self.config.rollover_interval;
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => lock(&state).rollover_if_new_day(),
                }
            }
        }));
    }

    /// Stop the background tasks. Already-recorded state is untouched and
    /// every other operation keeps working. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ---- submission surface -------------------------------------------------

    /// Pure construction of an [`ExecutionContext`] with a fresh id.
    pub fn create_execution_context(
        &self,
        agent_id: impl Into<String>,
        agent_type: impl Into<String>,
        tenant_id: impl Into<String>,
        submitted_by: impl Into<String>,
        input: Value,
        priority: Priority,
    ) -> ExecutionContext {
        ExecutionContext::new(agent_id, agent_type, tenant_id, submitted_by, input, priority)
    }

    /// Register a new execution as `Queued` and enqueue it in its priority
    /// bucket.
    pub fn start_execution(&self, context: ExecutionContext) -> ExecutionTrace {
        let snapshot = {
            let mut state = lock(&self.state);
            let execution_id = context.execution_id.clone();
            let priority = context.priority;
            let trace = ExecutionTrace::new(context);
            let snapshot = trace.clone();
            state.active.insert(execution_id.clone(), trace);
            if let Some(queue) = state.queues.get_mut(&priority) {
                queue.push_back(execution_id);
            }
            state.total_executions += 1;
            snapshot
        };

        info!(
            execution_id = %snapshot.execution_id(),
            agent_id = %snapshot.context.agent_id,
            priority = ?snapshot.context.priority,
            "Execution registered"
        );
        self.fire_execution_callbacks(&snapshot);
        snapshot
    }

    // ---- lifecycle surface --------------------------------------------------

    /// Transition a trace to `status`, merging optional metadata into its
    /// metrics map. Unknown ids and already-terminal traces are silent
    /// no-ops; entering `Running` dequeues the trace, entering any terminal
    /// status retires it into the completed history.
    pub fn update_execution_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        metadata: Option<HashMap<String, Value>>,
    ) {
        let snapshot = {
            let mut state = lock(&self.state);
            let Some(trace) = state.active.get_mut(execution_id) else {
                debug!(execution_id, ?status, "Status update for unknown execution");
                return;
            };
            if trace.status.is_terminal() {
                return;
            }

            if let Some(metadata) = metadata {
                trace.metrics.extend(metadata);
            }
            trace.status = status;

            if status == ExecutionStatus::Running {
                let priority = trace.context.priority;
                state.dequeue(priority, execution_id);
                state.active.get(execution_id).cloned()
            } else if status.is_terminal() {
                let seal = if status == ExecutionStatus::Completed {
                    StepStatus::Completed
                } else {
                    StepStatus::Failed
                };
                trace.seal_open_step(seal);
                state.retire(execution_id, self.config.history_capacity)
            } else {
                state.active.get(execution_id).cloned()
            }
        };

        if let Some(trace) = snapshot {
            debug!(execution_id, status = ?trace.status, "Execution status updated");
            self.fire_execution_callbacks(&trace);
        }
    }

    /// Open a new step on an active trace, sealing any currently open one.
    /// Returns `None` when the execution is unknown or already terminal.
    pub fn start_execution_step(
        &self,
        execution_id: &str,
        kind: StepKind,
        name: impl Into<String>,
        input: Option<Value>,
    ) -> Option<String> {
        let (step_id, snapshot) = {
            let mut state = lock(&self.state);
            let trace = state.active.get_mut(execution_id)?;
            if trace.status.is_terminal() {
                return None;
            }
            let step_id = trace.open_step(kind, name, input);
            let snapshot = trace.steps.last().cloned();
            (step_id, snapshot)
        };

        if let Some(step) = snapshot {
            self.fire_step_callbacks(&step);
        }
        Some(step_id)
    }

    /// Seal a step and roll its cost/token figures into the trace totals.
    /// A supplied error additionally goes through [`record_error`]. Completing
    /// an already-sealed step is ignored, so the totals stay equal to the sum
    /// over steps.
    ///
    /// [`record_error`]: Self::record_error
    #[allow(clippy::too_many_arguments)]
    pub fn complete_execution_step(
        &self,
        execution_id: &str,
        step_id: &str,
        output: Option<Value>,
        error: Option<String>,
        cost: f64,
        tokens: u64,
        confidence: Option<f64>,
    ) {
        let snapshot = {
            let mut state = lock(&self.state);
            let Some(trace) = state.active.get_mut(execution_id) else {
                debug!(execution_id, step_id, "Step completion for unknown execution");
                return;
            };
            let open = trace.open_step;
            let Some(step) = trace.step_mut(step_id) else {
                debug!(execution_id, step_id, "Step completion for unknown step");
                return;
            };
            if step.ended_at.is_some() {
                debug!(execution_id, step_id, "Step already sealed, ignoring");
                return;
            }

            step.output = output;
            step.cost = cost;
            step.tokens = tokens;
            step.confidence = confidence;
            let status = if error.is_some() {
                step.error = error.clone();
                StepStatus::Failed
            } else {
                StepStatus::Completed
            };
            step.seal(status);

            if open.is_some_and(|idx| trace.steps[idx].step_id == step_id) {
                trace.open_step = None;
            }
            trace.absorb_step_totals(step_id);
            trace.step_mut(step_id).cloned()
        };

        if let Some(step) = snapshot {
            self.fire_step_callbacks(&step);
        }
        if let Some(message) = error {
            self.record_error(execution_id, &message, Some(step_id));
        }
    }

    /// Record an error against a trace. Only the first error sticks;
    /// later ones still count toward the pattern statistics and still fire
    /// the error callbacks.
    pub fn record_error(&self, execution_id: &str, message: &str, step_id: Option<&str>) {
        let pattern = ErrorPattern::classify(message);
        {
            let mut state = lock(&self.state);
            let Some(trace) = state.active.get_mut(execution_id) else {
                debug!(execution_id, "Error recorded for unknown execution");
                return;
            };
            if trace.error.is_none() {
                trace.error = Some(message.to_string());
            }
            if let Some(step_id) = step_id
                && let Some(step) = trace.step_mut(step_id)
                && step.error.is_none()
            {
                step.error = Some(message.to_string());
            }
            *state.error_patterns.entry(pattern).or_insert(0) += 1;
        }

        warn!(execution_id, %pattern, message, "Execution error recorded");
        self.fire_error_callbacks(execution_id, message);
    }

    /// Finish an execution: seal any open step, store the final payload, and
    /// transition to `Completed`, or `Failed` when an error was previously
    /// recorded.
    pub fn complete_execution(
        &self,
        execution_id: &str,
        result: Option<Value>,
        confidence: Option<f64>,
        metrics: Option<HashMap<String, Value>>,
    ) {
        let snapshot = {
            let mut state = lock(&self.state);
            let Some(trace) = state.active.get_mut(execution_id) else {
                debug!(execution_id, "Completion for unknown execution");
                return;
            };
            if trace.status.is_terminal() {
                return;
            }

            trace.status = ExecutionStatus::Completing;
            trace.seal_open_step(StepStatus::Completed);
            trace.result = result;
            trace.confidence = confidence;
            if let Some(metrics) = metrics {
                trace.metrics.extend(metrics);
            }
            trace.status = if trace.error.is_some() {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Completed
            };
            state.retire(execution_id, self.config.history_capacity)
        };

        if let Some(trace) = snapshot {
            info!(
                execution_id,
                status = ?trace.status,
                duration_secs = trace.duration_secs(),
                total_tokens = trace.total_tokens,
                "Execution finished"
            );
            self.fire_execution_callbacks(&trace);
        }
    }

    // ---- observability surface ----------------------------------------------

    /// Look a trace up in the active set, then in the completed history.
    pub fn get_execution_trace(&self, execution_id: &str) -> Option<ExecutionTrace> {
        let state = lock(&self.state);
        state.active.get(execution_id).cloned().or_else(|| {
            state
                .history
                .iter()
                .rev()
                .find(|t| t.execution_id() == execution_id)
                .cloned()
        })
    }

    /// Snapshot of non-terminal executions, optionally filtered by agent
    /// and/or tenant.
    pub fn get_active_executions(
        &self,
        agent_id: Option<&str>,
        tenant_id: Option<&str>,
    ) -> Vec<ExecutionTrace> {
        let state = lock(&self.state);
        state
            .active
            .values()
            .filter(|t| agent_id.is_none_or(|a| t.context.agent_id == a))
            .filter(|t| tenant_id.is_none_or(|ten| t.context.tenant_id == ten))
            .cloned()
            .collect()
    }

    /// Execution ids currently queued at `priority`, in submission order.
    pub fn queued_executions(&self, priority: Priority) -> Vec<String> {
        let state = lock(&self.state);
        state
            .queues
            .get(&priority)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// System-wide statistics snapshot. With a [`TimeRange`], the completed /
    /// failed / cost / token figures cover only traces started inside the
    /// window; otherwise the whole retained history.
    pub fn get_execution_statistics(&self, range: Option<TimeRange>) -> ExecutionStatistics {
        let state = lock(&self.state);
        let in_range = |t: &&ExecutionTrace| range.is_none_or(|r| r.contains(t.started_at));

        let mut completed = 0u64;
        let mut failed = 0u64;
        let mut total_cost = 0.0;
        let mut total_tokens = 0u64;
        for trace in state.history.iter().filter(in_range) {
            match trace.status {
                ExecutionStatus::Completed => completed += 1,
                ExecutionStatus::Failed | ExecutionStatus::TimedOut => failed += 1,
                _ => {}
            }
            total_cost += trace.total_cost;
            total_tokens += trace.total_tokens;
        }

        ExecutionStatistics {
            total_executions: state.total_executions,
            active_executions: state.active.len(),
            queued_executions: state
                .queues
                .iter()
                .map(|(priority, queue)| (*priority, queue.len()))
                .collect(),
            completed_today: state.completed_today,
            failed_today: state.failed_today,
            completed,
            failed,
            average_duration_secs: state.average_duration_secs,
            total_cost,
            total_tokens,
            error_patterns: state.error_patterns.clone(),
        }
    }

    /// Aggregate over one agent's completed executions.
    pub fn get_agent_performance(
        &self,
        agent_id: &str,
        range: Option<TimeRange>,
    ) -> AgentPerformance {
        let state = lock(&self.state);
        let traces: Vec<&ExecutionTrace> = state
            .history
            .iter()
            .filter(|t| t.context.agent_id == agent_id)
            .filter(|t| range.is_none_or(|r| r.contains(t.started_at)))
            .collect();

        let executions = traces.len() as u64;
        let succeeded = traces
            .iter()
            .filter(|t| t.status == ExecutionStatus::Completed)
            .count() as u64;
        let failed = executions - succeeded;

        let durations: Vec<f64> = traces
            .iter()
            .filter_map(|t| t.duration_secs())
            .collect();
        let confidences: Vec<f64> = traces.iter().filter_map(|t| t.confidence).collect();
        let mean = |values: &[f64]| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        };

        let mut tools_used: Vec<String> = Vec::new();
        for trace in &traces {
            for tool in &trace.tools_used {
                if !tools_used.contains(tool) {
                    tools_used.push(tool.clone());
                }
            }
        }

        AgentPerformance {
            agent_id: agent_id.to_string(),
            executions,
            succeeded,
            failed,
            success_rate: if executions == 0 {
                0.0
            } else {
                succeeded as f64 / executions as f64
            },
            average_duration_secs: mean(&durations),
            average_confidence: mean(&confidences),
            total_cost: traces.iter().map(|t| t.total_cost).sum(),
            total_tokens: traces.iter().map(|t| t.total_tokens).sum(),
            tools_used,
        }
    }

    /// Recompute the rolling average duration immediately, outside the
    /// periodic schedule.
    pub fn refresh_statistics(&self) {
        lock(&self.state).refresh_average_duration(self.config.stats_window);
    }

    // ---- event surface ------------------------------------------------------

    pub fn add_execution_callback(&self, callback: ExecutionCallback) {
        lock(&self.execution_callbacks).push(callback);
    }

    pub fn add_step_callback(&self, callback: StepCallback) {
        lock(&self.step_callbacks).push(callback);
    }

    pub fn add_error_callback(&self, callback: ErrorCallback) {
        lock(&self.error_callbacks).push(callback);
    }

    fn fire_execution_callbacks(&self, trace: &ExecutionTrace) {
        let callbacks = lock(&self.execution_callbacks).clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(trace))).is_err() {
                warn!(execution_id = %trace.execution_id(), "Execution callback panicked");
            }
        }
    }

    fn fire_step_callbacks(&self, step: &ExecutionStep) {
        let callbacks = lock(&self.step_callbacks).clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(step))).is_err() {
                warn!(step_id = %step.step_id, "Step callback panicked");
            }
        }
    }

    fn fire_error_callbacks(&self, execution_id: &str, message: &str) {
        let callbacks = lock(&self.error_callbacks).clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(execution_id, message))).is_err() {
                warn!(execution_id, "Error callback panicked");
            }
        }
    }
}

impl Drop for ExecutionMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Lock helper that survives poisoning: a panicking callback elsewhere must
/// not take the whole monitor down.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
