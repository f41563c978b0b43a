//! RL Configuration
//!
//! Configuration structs for the DQN agent and the training loop.

use serde::{Deserialize, Serialize};

/// DQN agent hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Replay buffer capacity
    pub buffer_capacity: usize,
    /// Discount factor (gamma)
    pub gamma: f64,
    /// Learning rate
    pub learning_rate: f64,
    /// Initial exploration rate
    pub epsilon_start: f64,
    /// Minimum exploration rate
    pub epsilon_min: f64,
    /// Multiplicative decay applied after each learning update
    pub epsilon_decay: f64,
    /// Hidden layer widths of the Q-network
    pub hidden_sizes: Vec<usize>,
    /// Seed for exploration, sampling and weight init (entropy when unset)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2000,
            gamma: 0.95,
            learning_rate: 0.001,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            hidden_sizes: vec![24, 24],
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.buffer_capacity == 0 {
            errors.push("buffer_capacity must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            errors.push("gamma must be between 0 and 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            errors.push("learning_rate must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.epsilon_min) {
            errors.push("epsilon_min must be between 0 and 1".to_string());
        }
        if !(self.epsilon_min..=1.0).contains(&self.epsilon_start) {
            errors.push("epsilon_start must be between epsilon_min and 1".to_string());
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            errors.push("epsilon_decay must be in (0, 1]".to_string());
        }
        if self.hidden_sizes.iter().any(|w| *w == 0) {
            errors.push("hidden_sizes must not contain zero-width layers".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Training loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of episodes per run
    pub episodes: usize,
    /// Simulated ticks per episode
    pub max_steps: u64,
    /// Mini-batch size for each learning update
    pub batch_size: usize,
    /// Ticks between agent decisions
    pub decision_interval: u32,
    /// Path of the weights checkpoint
    pub checkpoint_path: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 50,
            max_steps: 1000,
            batch_size: 32,
            decision_interval: 5,
            checkpoint_path: "./models/dqn_traffic.json".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.batch_size == 0 {
            errors.push("batch_size must be positive".to_string());
        }
        if self.decision_interval == 0 {
            errors.push("decision_interval must be positive".to_string());
        }
        if self.checkpoint_path.trim().is_empty() {
            errors.push("checkpoint_path must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AgentConfig::default().validate().is_ok());
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let config = AgentConfig {
            gamma: 1.5,
            epsilon_decay: 0.0,
            ..AgentConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }
}
