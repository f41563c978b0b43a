//! Model Checkpointing
//!
//! Save and load value-function weights. Only the weights are persisted: exploration rate and
//! replay memory always start fresh in a new process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{GreenwaveError, Result};
use crate::ml::DenseNetwork;

/// Bumped whenever the envelope layout changes
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// On-disk checkpoint layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    /// Learning updates applied to the weights when saved
    #[serde(default)]
    pub updates: u64,
    pub network: DenseNetwork,
}

/// Reads and writes a single checkpoint file
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the weights.
    ///
    /// The file is written beside the target and renamed into place, so a failed save leaves
    /// any previous checkpoint untouched.
    pub fn save(&self, network: &DenseNetwork, updates: u64) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                GreenwaveError::CheckpointIo(format!(
                    "failed to create checkpoint directory {:?}: {}",
                    dir, e
                ))
            })?;
        }

        let envelope = CheckpointEnvelope {
            format_version: CHECKPOINT_FORMAT_VERSION,
            created_at: Utc::now(),
            updates,
            network: network.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| GreenwaveError::CheckpointIo(format!("failed to encode checkpoint: {e}")))?;

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|e| {
            GreenwaveError::CheckpointIo(format!("failed to write {:?}: {}", tmp, e))
        })?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(GreenwaveError::CheckpointIo(format!(
                "failed to move checkpoint into {:?}: {}",
                self.path, e
            )));
        }

        info!("Saved checkpoint to {:?}", self.path);
        Ok(())
    }

    /// Read the weights back.
    pub fn load(&self) -> Result<DenseNetwork> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            GreenwaveError::CheckpointIo(format!("failed to read {:?}: {}", self.path, e))
        })?;
        let envelope: CheckpointEnvelope = serde_json::from_str(&content).map_err(|e| {
            GreenwaveError::CheckpointIo(format!("malformed checkpoint {:?}: {}", self.path, e))
        })?;

        if envelope.format_version > CHECKPOINT_FORMAT_VERSION {
            warn!(
                "Checkpoint {:?} uses format v{} (this build writes v{}); unknown fields ignored",
                self.path, envelope.format_version, CHECKPOINT_FORMAT_VERSION
            );
        }
        envelope
            .network
            .validate()
            .map_err(|e| GreenwaveError::CheckpointIo(format!("invalid weights: {e}")))?;

        info!(
            "Loaded checkpoint {:?} (saved {}, {} updates)",
            self.path, envelope.created_at, envelope.updates
        );
        Ok(envelope.network)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp-{}", uuid::Uuid::new_v4()));
        self.path.with_file_name(name)
    }
}
