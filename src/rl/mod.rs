//! Reinforcement Learning Module
//!
//! DQN signal control: the agent picks which movement group it wants green every decision
//! interval, and the training loop drives it against an environment session.

pub mod agent;
pub mod config;
pub mod memory;
pub mod training;

pub use agent::{DqnAgent, LearnStats, NUM_ACTIONS};
pub use config::{AgentConfig, TrainingConfig};
pub use memory::{Experience, ReplayBuffer, State};
pub use training::{
    interval_reward, Checkpointer, EpisodeResult, TrainingOrchestrator, TrainingStats,
};
