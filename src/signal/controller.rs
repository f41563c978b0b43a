//! Rule-based controllers
//!
//! Controllers only ever *request* a switch; the [`SignalStateMachine`] decides whether the
//! request is honoured, so no policy can shorten a clearance phase or cut a green below
//! `min_green`.

use crate::environment::QueueObservation;
use crate::signal::program::PhaseKind;
use crate::signal::state_machine::SignalStateMachine;

/// Policy layered over the state machine
pub trait SignalController: Send {
    fn name(&self) -> &'static str;

    /// Whether to request a switch on this tick
    fn wants_switch(&self, machine: &SignalStateMachine, queues: &QueueObservation) -> bool;
}

/// Queue-threshold controller: give up the green once its approaches are empty and the
/// opposing group has vehicles waiting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveBaseline;

impl AdaptiveBaseline {
    pub fn new() -> Self {
        Self
    }
}

impl SignalController for AdaptiveBaseline {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn wants_switch(&self, machine: &SignalStateMachine, queues: &QueueObservation) -> bool {
        match machine.green_group() {
            Some(green) => {
                queues.group_queue(green) == 0 && queues.group_queue(green.opposing()) > 0
            }
            None => false,
        }
    }
}

/// Fixed-time plan: every green runs for its program duration regardless of demand.
///
/// The request is raised on the tick that completes the duration, so a 22-tick green is
/// displayed for exactly 22 ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTime;

impl FixedTime {
    pub fn new() -> Self {
        Self
    }
}

impl SignalController for FixedTime {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn wants_switch(&self, machine: &SignalStateMachine, _queues: &QueueObservation) -> bool {
        let phase = machine.current_phase();
        phase.kind() == PhaseKind::Green && machine.elapsed() + 1 >= phase.duration()
    }
}
