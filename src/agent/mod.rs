//! The per-task reasoning loop.
//!
//! A [`ReasoningAgent`] drives one [`ExecutionContext`] through a bounded
//! think/act cycle: request a completion, classify it, invoke tools, repeat
//! until a final answer or the iteration cap, reporting every step to the
//! [`ExecutionMonitor`].
//!
//! [`ExecutionContext`]: crate::monitor::ExecutionContext
//! [`ExecutionMonitor`]: crate::monitor::ExecutionMonitor

mod classifier;
mod config;
mod events;
mod execution;
mod executor;

pub use classifier::{Decision, classify_response, default_parameters, select_tool};
pub use config::AgentConfig;
pub use events::AgentResult;
pub use executor::{AgentBuilder, ReasoningAgent};
