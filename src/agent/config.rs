//! Reasoning-loop configuration.

/// Tuning knobs for one agent's think/act cycle.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard cap on loop iterations.
    pub max_iterations: usize,
    /// Maximum prior conversation turns resent per iteration.
    pub history_window: usize,
    /// Model identifier passed to the completion client.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Flat per-token cost estimate used for step accounting.
    pub token_cost: f64,
    /// Confidence weight attached to each successful tool result.
    pub evidence_confidence: f64,
    /// Confidence ceiling applied when the iteration cap is exhausted.
    pub capped_confidence: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            history_window: 10,
            model: "default".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            token_cost: 3.0e-5,
            evidence_confidence: 0.8,
            capped_confidence: 0.7,
        }
    }
}

impl AgentConfig {
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_token_cost(mut self, cost: f64) -> Self {
        self.token_cost = cost;
        self
    }
}
