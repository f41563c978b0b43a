//! Training Infrastructure
//!
//! Episode loop and checkpointing.

pub mod checkpointing;
pub mod trainer;

pub use checkpointing::{CheckpointEnvelope, Checkpointer, CHECKPOINT_FORMAT_VERSION};
pub use trainer::{interval_reward, EpisodeResult, TrainingOrchestrator, TrainingStats};
