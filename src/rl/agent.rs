//! DQN Control Agent
//!
//! Epsilon-greedy policy over a small MLP action-value function, trained from a replay
//! buffer with bootstrapped one-step targets.
//!
//! The target `r + γ·max_a' Q(s', a')` is computed with a plain forward pass and used only as
//! a regression constant, so the update is semi-gradient Q-learning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::debug;

use crate::environment::OBSERVATION_DIM;
use crate::error::{GreenwaveError, Result};
use crate::ml::{Adam, AdamConfig, DenseNetwork, Gradients};
use crate::rl::config::AgentConfig;
use crate::rl::memory::{Experience, ReplayBuffer, State};
use crate::rl::training::checkpointing::Checkpointer;

/// Number of control actions (NS green, EW green)
pub const NUM_ACTIONS: usize = 2;

/// Outcome of one learning update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnStats {
    /// Mean of 0.5 * (Q(s, a) - target)^2 over the batch, before the update
    pub loss: f64,
    pub epsilon: f64,
}

pub struct DqnAgent {
    config: AgentConfig,
    network: DenseNetwork,
    optimizer: Adam,
    memory: ReplayBuffer,
    epsilon: f64,
    rng: StdRng,
    updates: u64,
}

impl DqnAgent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| GreenwaveError::Configuration(errors.join("; ")))?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let network = DenseNetwork::mlp(OBSERVATION_DIM, &config.hidden_sizes, NUM_ACTIONS, &mut rng);
        let optimizer = Adam::new(AdamConfig::with_learning_rate(config.learning_rate), &network);

        Ok(Self {
            memory: ReplayBuffer::new(config.buffer_capacity),
            epsilon: config.epsilon_start,
            network,
            optimizer,
            rng,
            updates: 0,
            config,
        })
    }

    /// Predicted action-values for `state`
    pub fn q_values(&self, state: &State) -> Result<[f64; NUM_ACTIONS]> {
        let out = self.network.forward(state)?;
        Ok([out[0], out[1]])
    }

    /// Argmax over predicted values; ties go to action 0.
    pub fn greedy_action(&self, state: &State) -> Result<usize> {
        let q = self.q_values(state)?;
        Ok(if q[1] > q[0] { 1 } else { 0 })
    }

    /// Epsilon-greedy action selection
    pub fn act(&mut self, state: &State) -> Result<usize> {
        if self.rng.gen::<f64>() < self.epsilon {
            return Ok(self.rng.gen_range(0..NUM_ACTIONS));
        }
        self.greedy_action(state)
    }

    /// Store a transition. Actions outside `0..NUM_ACTIONS` are rejected.
    pub fn remember(&mut self, experience: Experience) -> Result<()> {
        if experience.action >= NUM_ACTIONS {
            return Err(GreenwaveError::Validation(format!(
                "action {} out of range (0..{})",
                experience.action, NUM_ACTIONS
            )));
        }
        self.memory.push(experience);
        Ok(())
    }

    /// One batched semi-gradient update, followed by epsilon decay.
    ///
    /// # Panics
    ///
    /// Panics if the replay buffer holds fewer than `batch_size` experiences.
    pub fn learn(&mut self, batch_size: usize) -> Result<LearnStats> {
        assert!(
            batch_size > 0 && self.memory.has_enough_samples(batch_size),
            "learn({}) called with {} buffered experiences",
            batch_size,
            self.memory.len()
        );

        let batch = self.memory.sample(batch_size, &mut self.rng);
        let mut grads = Gradients::zeros_like(&self.network);
        let scale = 1.0 / batch_size as f64;
        let mut loss = 0.0;

        for experience in &batch {
            let target = self.target(experience)?;

            let cache = self.network.forward_with_cache(&experience.state)?;
            let error = cache.output()[experience.action] - target;

            // Only the taken action's output contributes to the loss
            let mut output_grad = [0.0; NUM_ACTIONS];
            output_grad[experience.action] = error * scale;
            self.network.backward(&cache, &output_grad, &mut grads);

            loss += 0.5 * error * error * scale;
        }

        self.optimizer.step(&mut self.network, &grads);
        self.updates += 1;
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);

        debug!(
            update = self.updates,
            loss,
            epsilon = self.epsilon,
            "learning update"
        );

        Ok(LearnStats {
            loss,
            epsilon: self.epsilon,
        })
    }

    /// Bootstrapped regression target, a constant with respect to the update.
    fn target(&self, experience: &Experience) -> Result<f64> {
        if experience.terminal {
            return Ok(experience.reward);
        }
        let next = self.q_values(&experience.next_state)?;
        Ok(experience.reward + self.config.gamma * next[0].max(next[1]))
    }

    /// Persist the value-function weights. Exploration rate and replay memory are not saved.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Checkpointer::new(path).save(&self.network, self.updates)
    }

    /// Restore weights from `path`; on error the current weights are kept.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let network = Checkpointer::new(path).load()?;
        self.restore(network)
    }

    /// Replace the weights, resetting optimizer state.
    pub fn restore(&mut self, network: DenseNetwork) -> Result<()> {
        if network.input_dim != OBSERVATION_DIM || network.output_dim() != NUM_ACTIONS {
            return Err(GreenwaveError::CheckpointIo(format!(
                "checkpoint network maps {} -> {}, expected {} -> {}",
                network.input_dim,
                network.output_dim(),
                OBSERVATION_DIM,
                NUM_ACTIONS
            )));
        }
        network.validate().map_err(GreenwaveError::CheckpointIo)?;

        self.optimizer = Adam::new(
            AdamConfig::with_learning_rate(self.config.learning_rate),
            &network,
        );
        self.network = network;
        Ok(())
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }


    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }


    pub fn updates(&self) -> u64 {
        self.updates
    }

}
