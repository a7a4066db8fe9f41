//! Execution request types.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Queue placement priority for a submitted execution.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
        Priority::Critical,
    ];
}

/// Immutable description of one submitted task.
///
/// Identity fields are fixed at creation; only the metadata map may be
/// merged afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub agent_id: String,
    pub agent_type: String,
    pub tenant_id: String,
    pub submitted_by: String,
    pub input: Value,
    pub priority: Priority,
    /// Wall-clock budget enforced by the external dispatcher.
    pub timeout: Duration,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

impl ExecutionContext {
    /// Construct a context with a freshly generated execution id.
    ///
    /// Ids combine the agent id, a millisecond timestamp, and a random
    /// suffix, so they stay collision-resistant across concurrent
    /// submitters.
    pub fn new(
        agent_id: impl Into<String>,
        agent_type: impl Into<String>,
        tenant_id: impl Into<String>,
        submitted_by: impl Into<String>,
        input: Value,
        priority: Priority,
    ) -> Self {
        let agent_id = agent_id.into();
        let execution_id = format!(
            "{}-{}-{:08x}",
            agent_id,
            Utc::now().timestamp_millis(),
            rand::random::<u32>()
        );
        Self {
            execution_id,
            agent_id,
            agent_type: agent_type.into(),
            tenant_id: tenant_id.into(),
            submitted_by: submitted_by.into(),
            input,
            priority,
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
