//! Execution Monitor Tests
//!
//! Lifecycle, invariants, and observability surface of the shared monitor:
//! queue placement, step sealing, terminal absorption, history eviction,
//! statistics, and the callback event surface.
//!
//! Run: cargo test --test monitor_tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use agent_runtime::{
    ErrorPattern, ExecutionContext, ExecutionMonitor, ExecutionStatus, MonitorConfig, Priority,
    StepKind, StepStatus, TimeRange,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();
}

fn monitor() -> ExecutionMonitor {
    init_tracing();
    ExecutionMonitor::new(MonitorConfig::default())
}

fn submit(monitor: &ExecutionMonitor, agent: &str, priority: Priority) -> String {
    let context = monitor.create_execution_context(
        agent,
        "research",
        "tenant-a",
        "operator",
        json!({"task": "inspect"}),
        priority,
    );
    monitor.start_execution(context).execution_id().to_string()
}

// =============================================================================
// Full lifecycle scenario
// =============================================================================

#[tokio::test]
async fn high_priority_lifecycle_scenario() {
    let m = monitor();
    let context = m
        .create_execution_context(
            "agent-7",
            "research",
            "tenant-a",
            "operator",
            json!({"task": "audit"}),
            Priority::High,
        )
        .with_timeout(Duration::from_secs(300));
    let id = context.execution_id.clone();

    // Submitted: queued and visible as active.
    let trace = m.start_execution(context);
    assert_eq!(trace.status, ExecutionStatus::Queued);
    assert!(m.get_active_executions(None, None).iter().any(|t| t.execution_id() == id));
    assert_eq!(m.queued_executions(Priority::High), vec![id.clone()]);

    // Running: dequeued but still active.
    m.update_execution_status(&id, ExecutionStatus::Running, None);
    assert!(m.queued_executions(Priority::High).is_empty());
    assert!(m.get_active_executions(None, None).iter().any(|t| t.execution_id() == id));

    // Second step auto-seals the first as completed.
    let first = m
        .start_execution_step(&id, StepKind::LlmRequest, "llm_request_1", None)
        .unwrap();
    let _second = m
        .start_execution_step(&id, StepKind::ToolCall, "lookup", None)
        .unwrap();
    let trace = m.get_execution_trace(&id).unwrap();
    let sealed = trace.steps.iter().find(|s| s.step_id == first).unwrap();
    assert_eq!(sealed.status, StepStatus::Completed);
    assert_eq!(trace.running_steps(), 1);

    // Completion moves the trace out of the active map and bumps the
    // daily counter.
    let before = m.get_execution_statistics(None).completed_today;
    m.complete_execution(&id, Some(json!({"verdict": "clean"})), Some(0.8), None);
    let trace = m.get_execution_trace(&id).unwrap();
    assert_eq!(trace.status, ExecutionStatus::Completed);
    assert_eq!(trace.confidence, Some(0.8));
    assert!(trace.ended_at.is_some());
    assert!(m.get_active_executions(None, None).is_empty());
    assert_eq!(m.get_execution_statistics(None).completed_today, before + 1);
}

// =============================================================================
// Invariants
// =============================================================================

#[tokio::test]
async fn execution_ids_are_pairwise_distinct() {
    let m = monitor();
    let mut ids: Vec<String> = (0..500).map(|_| submit(&m, "agent-1", Priority::Normal)).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 500);
}

#[tokio::test]
async fn at_most_one_step_running() {
    let m = monitor();
    let id = submit(&m, "agent-1", Priority::Normal);
    for i in 0..10 {
        m.start_execution_step(&id, StepKind::Processing, format!("step_{i}"), None);
        assert!(m.get_execution_trace(&id).unwrap().running_steps() <= 1);
    }
}

#[tokio::test]
async fn totals_match_step_sums() {
    let m = monitor();
    let id = submit(&m, "agent-1", Priority::Normal);
    for (cost, tokens) in [(0.01, 100u64), (0.02, 250), (0.0, 0)] {
        let step = m
            .start_execution_step(&id, StepKind::LlmRequest, "llm", None)
            .unwrap();
        m.complete_execution_step(&id, &step, None, None, cost, tokens, None);
    }
    m.complete_execution(&id, None, None, None);

    let trace = m.get_execution_trace(&id).unwrap();
    let cost_sum: f64 = trace.steps.iter().map(|s| s.cost).sum();
    let token_sum: u64 = trace.steps.iter().map(|s| s.tokens).sum();
    assert!((trace.total_cost - cost_sum).abs() < 1e-9);
    assert_eq!(trace.total_tokens, token_sum);
    assert_eq!(trace.total_tokens, 350);
}

#[tokio::test]
async fn terminal_states_are_absorbing() {
    let m = monitor();
    for terminal in [
        ExecutionStatus::Completed,
        ExecutionStatus::Failed,
        ExecutionStatus::TimedOut,
        ExecutionStatus::Cancelled,
    ] {
        let id = submit(&m, "agent-1", Priority::Normal);
        m.update_execution_status(&id, terminal, None);

        assert!(m.start_execution_step(&id, StepKind::Processing, "late", None).is_none());
        m.update_execution_status(&id, ExecutionStatus::Running, None);
        assert_eq!(m.get_execution_trace(&id).unwrap().status, terminal);
    }
}

#[tokio::test]
async fn history_ring_evicts_oldest() {
    let m = ExecutionMonitor::new(MonitorConfig::default().with_history_capacity(50));
    let mut ids = Vec::new();
    for _ in 0..51 {
        let id = submit(&m, "agent-1", Priority::Normal);
        m.complete_execution(&id, None, None, None);
        ids.push(id);
    }

    assert!(m.get_execution_trace(&ids[0]).is_none());
    assert!(m.get_execution_trace(&ids[1]).is_some());
    assert!(m.get_execution_trace(ids.last().unwrap()).is_some());
}

// =============================================================================
// External cancellation and timeout
// =============================================================================

#[tokio::test]
async fn dispatcher_driven_timeout_and_cancel() {
    let m = monitor();

    let timed_out = submit(&m, "agent-1", Priority::Normal);
    m.update_execution_status(&timed_out, ExecutionStatus::TimedOut, None);
    assert_eq!(
        m.get_execution_trace(&timed_out).unwrap().status,
        ExecutionStatus::TimedOut
    );

    // A recorded error survives an external cancellation.
    let cancelled = submit(&m, "agent-1", Priority::Normal);
    m.record_error(&cancelled, "operator pulled the plug", None);
    m.update_execution_status(&cancelled, ExecutionStatus::Cancelled, None);
    let trace = m.get_execution_trace(&cancelled).unwrap();
    assert_eq!(trace.status, ExecutionStatus::Cancelled);
    assert_eq!(trace.error.as_deref(), Some("operator pulled the plug"));

    let stats = m.get_execution_statistics(None);
    assert_eq!(stats.failed_today, 1); // timeout counts, cancel does not
}

// =============================================================================
// Statistics and performance queries
// =============================================================================

#[tokio::test]
async fn statistics_respect_time_range() {
    let m = monitor();
    let id = submit(&m, "agent-1", Priority::Normal);
    m.complete_execution(&id, None, None, None);

    let everything = m.get_execution_statistics(None);
    assert_eq!(everything.completed, 1);

    let ancient = TimeRange::new(
        chrono::Utc::now() - chrono::Duration::days(2),
        chrono::Utc::now() - chrono::Duration::days(1),
    );
    let windowed = m.get_execution_statistics(Some(ancient));
    assert_eq!(windowed.completed, 0);
    // Running counters are unaffected by the window.
    assert_eq!(windowed.total_executions, 1);
}

#[tokio::test]
async fn error_patterns_aggregate_by_taxonomy() {
    let m = monitor();
    for (message, expected) in [
        ("request timed out upstream", ErrorPattern::Timeout),
        ("rate limit hit, slow down", ErrorPattern::RateLimit),
        ("connection reset by peer", ErrorPattern::Network),
    ] {
        let id = submit(&m, "agent-1", Priority::Normal);
        m.record_error(&id, message, None);
        let stats = m.get_execution_statistics(None);
        assert_eq!(stats.error_patterns[&expected], 1, "bucket for {message}");
    }
}

#[tokio::test]
async fn agent_performance_summarizes_history() {
    let m = monitor();
    for _ in 0..2 {
        let id = submit(&m, "agent-9", Priority::Normal);
        let step = m
            .start_execution_step(&id, StepKind::ToolCall, "lookup", None)
            .unwrap();
        m.complete_execution_step(&id, &step, None, None, 0.05, 1000, None);
        m.complete_execution(&id, None, Some(0.9), None);
    }
    let other = submit(&m, "agent-other", Priority::Normal);
    m.complete_execution(&other, None, None, None);

    let perf = m.get_agent_performance("agent-9", None);
    assert_eq!(perf.executions, 2);
    assert_eq!(perf.succeeded, 2);
    assert!((perf.success_rate - 1.0).abs() < 1e-9);
    assert!((perf.average_confidence - 0.9).abs() < 1e-9);
    assert_eq!(perf.total_tokens, 2000);
    assert_eq!(perf.tools_used, vec!["lookup"]);

    let empty = m.get_agent_performance("agent-unknown", None);
    assert_eq!(empty.executions, 0);
    assert!((empty.success_rate - 0.0).abs() < 1e-9);
}

// =============================================================================
// Event surface
// =============================================================================

#[tokio::test]
async fn step_callbacks_fire_on_start_and_complete() {
    let m = monitor();
    let events = Arc::new(Mutex::new(Vec::<(String, StepStatus)>::new()));
    let sink = Arc::clone(&events);
    m.add_step_callback(Arc::new(move |step| {
        sink.lock().unwrap().push((step.name.clone(), step.status));
    }));

    let id = submit(&m, "agent-1", Priority::Normal);
    let step = m
        .start_execution_step(&id, StepKind::Processing, "crunch", None)
        .unwrap();
    m.complete_execution_step(&id, &step, None, None, 0.0, 0, None);

    let events = events.lock().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], ("crunch".to_string(), StepStatus::Running));
    assert_eq!(events[1], ("crunch".to_string(), StepStatus::Completed));
}

#[tokio::test]
async fn panicking_callback_does_not_abort_operations() {
    let m = monitor();
    m.add_execution_callback(Arc::new(|_| panic!("misbehaving sink")));
    m.add_error_callback(Arc::new(|_, _| panic!("misbehaving sink")));

    let id = submit(&m, "agent-1", Priority::Normal);
    m.record_error(&id, "boom", None);
    m.complete_execution(&id, None, None, None);

    // Everything above still took effect.
    let trace = m.get_execution_trace(&id).unwrap();
    assert_eq!(trace.status, ExecutionStatus::Failed);
}

// =============================================================================
// Lifecycle of the monitor itself
// =============================================================================

#[tokio::test]
async fn shutdown_preserves_state_and_is_idempotent() {
    let m = ExecutionMonitor::new(
        MonitorConfig::default().with_stats_interval(Duration::from_millis(10)),
    );
    let id = submit(&m, "agent-1", Priority::Normal);
    m.complete_execution(&id, None, None, None);

    m.shutdown().await;
    m.shutdown().await;

    assert!(m.get_execution_trace(&id).is_some());
    assert_eq!(m.get_execution_statistics(None).completed_today, 1);
    // Manual refresh still works after the periodic task stopped.
    m.refresh_statistics();
    assert!(m.get_execution_statistics(None).average_duration_secs >= 0.0);
}

#[tokio::test]
async fn rolling_average_refreshes_in_background() {
    let m = ExecutionMonitor::new(
        MonitorConfig::default()
            .with_stats_interval(Duration::from_millis(5))
            .with_stats_window(10),
    );
    let id = submit(&m, "agent-1", Priority::Normal);
    tokio::time::sleep(Duration::from_millis(20)).await;
    m.complete_execution(&id, None, None, None);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let stats = m.get_execution_statistics(None);
    assert!(stats.average_duration_secs > 0.0);
    m.shutdown().await;
}

// =============================================================================
// Context construction
// =============================================================================

#[tokio::test]
async fn context_metadata_and_tags_round_trip() {
    let m = monitor();
    let context = ExecutionContext::new(
        "agent-1",
        "research",
        "tenant-a",
        "operator",
        json!({"q": 1}),
        Priority::Urgent,
    )
    .with_tag("batch")
    .with_metadata("origin", json!("api"));
    let id = context.execution_id.clone();
    m.start_execution(context);

    let mut extra = HashMap::new();
    extra.insert("worker".to_string(), json!("pool-1"));
    m.update_execution_status(&id, ExecutionStatus::Starting, Some(extra));

    let trace = m.get_execution_trace(&id).unwrap();
    assert_eq!(trace.context.tags, vec!["batch"]);
    assert_eq!(trace.context.metadata["origin"], "api");
    assert_eq!(trace.metrics["worker"], "pool-1");
    assert_eq!(trace.context.priority, Priority::Urgent);
}
