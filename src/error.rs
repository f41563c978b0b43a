use thiserror::Error;

/// Main error type for the signal controller
#[derive(Error, Debug)]
pub enum GreenwaveError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    // Environment errors
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    // Checkpoint errors
    #[error("Checkpoint IO error: {0}")]
    CheckpointIo(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GreenwaveError {
    /// Errors that must stop the whole run rather than just one episode's side effects.
    ///
    /// Checkpoint failures are the only recoverable class: a failed load falls back to fresh
    /// weights and a failed save is retried on the next episode boundary.
    pub fn is_fatal_to_run(&self) -> bool {
        !matches!(self, Self::CheckpointIo(_))
    }
}

/// Result type alias for GreenwaveError
pub type Result<T> = std::result::Result<T, GreenwaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_errors_are_not_fatal() {
        assert!(!GreenwaveError::CheckpointIo("disk full".into()).is_fatal_to_run());
        assert!(GreenwaveError::EnvironmentUnavailable("gone".into()).is_fatal_to_run());
        assert!(GreenwaveError::Configuration("bad".into()).is_fatal_to_run());
    }

    #[test]
    fn display_carries_detail() {
        let err = GreenwaveError::Configuration("codes differ in length".into());
        assert_eq!(err.to_string(), "Configuration error: codes differ in length");
    }
}
