//! Reasoning agent structure and construction.

use std::sync::Arc;

use super::config::AgentConfig;
use crate::client::CompletionClient;
use crate::monitor::ExecutionMonitor;
use crate::prompts::{DefaultPromptBuilder, SystemPromptBuilder};
use crate::tools::ToolRegistry;

/// Drives one task at a time through the bounded think/act cycle.
///
/// The agent owns no execution state itself; everything observable lives on
/// the injected [`ExecutionMonitor`], so one agent value can serve many
/// sequential tasks and many agents can share one monitor.
pub struct ReasoningAgent {
    pub(crate) agent_id: String,
    pub(crate) agent_type: String,
    pub(crate) client: Arc<dyn CompletionClient>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) prompts: Arc<dyn SystemPromptBuilder>,
    pub(crate) monitor: Arc<ExecutionMonitor>,
    pub(crate) config: AgentConfig,
}

impl ReasoningAgent {
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<ExecutionMonitor> {
        &self.monitor
    }
}

/// Fluent constructor for [`ReasoningAgent`].
#[derive(Default)]
pub struct AgentBuilder {
    agent_id: Option<String>,
    agent_type: Option<String>,
    client: Option<Arc<dyn CompletionClient>>,
    tools: Option<Arc<ToolRegistry>>,
    prompts: Option<Arc<dyn SystemPromptBuilder>>,
    monitor: Option<Arc<ExecutionMonitor>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            config: AgentConfig::default(),
            ..Default::default()
        }
    }

    pub fn agent(mut self, agent_id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self.agent_type = Some(agent_type.into());
        self
    }

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn prompts(mut self, prompts: Arc<dyn SystemPromptBuilder>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn monitor(mut self, monitor: Arc<ExecutionMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> crate::Result<ReasoningAgent> {
        let client = self
            .client
            .ok_or_else(|| crate::Error::Config("completion client is required".into()))?;
        let monitor = self
            .monitor
            .ok_or_else(|| crate::Error::Config("execution monitor is required".into()))?;

        Ok(ReasoningAgent {
            agent_id: self.agent_id.unwrap_or_else(|| "agent".to_string()),
            agent_type: self.agent_type.unwrap_or_else(|| "general".to_string()),
            client,
            tools: self.tools.unwrap_or_else(|| Arc::new(ToolRegistry::new())),
            prompts: self.prompts.unwrap_or_else(|| Arc::new(DefaultPromptBuilder)),
            monitor,
            config: self.config,
        })
    }
}
