//! Replay Buffer
//!
//! Bounded FIFO experience store for off-policy learning.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::environment::OBSERVATION_DIM;

/// Observation features fed to the value function
pub type State = [f64; OBSERVATION_DIM];

/// A single transition in the environment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// State features before action
    pub state: State,
    /// Action taken (0 = NS green, 1 = EW green)
    pub action: usize,
    /// Reward received
    pub reward: f64,
    /// Next state features
    pub next_state: State,
    /// Whether the episode terminated at this transition
    pub terminal: bool,
}

impl Experience {
    pub fn new(state: State, action: usize, reward: f64, next_state: State, terminal: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
        }
    }
}

/// Replay buffer for experience storage
#[derive(Debug)]
pub struct ReplayBuffer {
    /// Storage for experiences, oldest first
    buffer: VecDeque<Experience>,
    /// Maximum capacity
    capacity: usize,
}

impl ReplayBuffer {
    /// Create a new replay buffer with given capacity
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an experience, evicting the oldest one when full
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Draw `batch_size` experiences uniformly at random without replacement.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `batch_size` experiences are stored; callers must check
    /// [`ReplayBuffer::len`] first.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        assert!(
            batch_size <= self.buffer.len(),
            "cannot sample {} experiences from a buffer holding {}",
            batch_size,
            self.buffer.len()
        );

        index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i])
            .collect()
    }

    /// Get current number of experiences
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer has enough samples for training
    pub fn has_enough_samples(&self, min_samples: usize) -> bool {
        self.buffer.len() >= min_samples
    }

    /// Stored experiences, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(2000)
    }
}
