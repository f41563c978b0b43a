pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod ml;
pub mod rl;
pub mod signal;

pub use config::AppConfig;
pub use environment::{
    EnvironmentFactory, EnvironmentSession, QueueObservation, SessionConfig,
    SimulatedIntersectionFactory, SimulationConfig,
};
pub use error::{GreenwaveError, Result};
pub use rl::{AgentConfig, DqnAgent, TrainingConfig, TrainingOrchestrator};
pub use signal::{
    build_program, ControllerRun, GreenTiming, RunSummary, SignalController, SignalProgram,
    SignalStateMachine,
};
