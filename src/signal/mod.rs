//! Signal control core: phase program, safety state machine and rule-based controllers.

pub mod controller;
pub mod program;
pub mod runner;
pub mod state_machine;

pub use controller::{AdaptiveBaseline, FixedTime, SignalController};
pub use program::{
    build_program, build_program_from_codes, LaneSignal, MovementGroup, Phase, PhaseKind,
    SignalCode, SignalProgram, ALL_RED_TICKS, DEFAULT_GREEN_TICKS, PHASE_COUNT, YELLOW_TICKS,
};
pub use runner::{ControllerRun, RunSummary};
pub use state_machine::{
    GreenTiming, PhaseTransition, SignalStateMachine, DEFAULT_MAX_GREEN, DEFAULT_MIN_GREEN,
};
