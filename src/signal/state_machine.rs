//! Signal State Machine
//!
//! Tick-driven controller over a [`SignalProgram`]. Green phases hold for at least
//! `min_green` ticks and at most `max_green`; clearance phases (yellow, all-red) always run
//! for exactly their program duration and ignore switch requests.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GreenwaveError, Result};
use crate::signal::program::{MovementGroup, Phase, PhaseKind, SignalCode, SignalProgram};

pub const DEFAULT_MIN_GREEN: u32 = 5;
pub const DEFAULT_MAX_GREEN: u32 = 60;

/// Bounds on how long a green phase may be held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreenTiming {
    min_green: u32,
    max_green: u32,
}

impl GreenTiming {
    pub fn new(min_green: u32, max_green: u32) -> Result<Self> {
        if min_green == 0 {
            return Err(GreenwaveError::Configuration(
                "min_green must be at least 1 tick".to_string(),
            ));
        }
        if max_green < min_green {
            return Err(GreenwaveError::Configuration(format!(
                "max_green ({max_green}) must not be less than min_green ({min_green})"
            )));
        }
        Ok(Self {
            min_green,
            max_green,
        })
    }

    pub fn min_green(&self) -> u32 {
        self.min_green
    }

    pub fn max_green(&self) -> u32 {
        self.max_green
    }
}

impl Default for GreenTiming {
    fn default() -> Self {
        Self {
            min_green: DEFAULT_MIN_GREEN,
            max_green: DEFAULT_MAX_GREEN,
        }
    }
}

/// Emitted once per phase change; carries the code the environment must display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: usize,
    pub to: usize,
    pub signal_code: SignalCode,
    /// Tick count at which the new phase became active
    pub tick: u64,
    /// True when a green was ended by the max-green limit rather than a request
    pub forced: bool,
}

pub struct SignalStateMachine {
    program: SignalProgram,
    timing: GreenTiming,
    current: usize,
    elapsed: u32,
    ticks: u64,
    transitions: u64,
    forced_switches: u64,
}

impl SignalStateMachine {
    pub fn new(program: SignalProgram, timing: GreenTiming) -> Self {
        Self {
            program,
            timing,
            current: 0,
            elapsed: 0,
            ticks: 0,
            transitions: 0,
            forced_switches: 0,
        }
    }

    /// Advance by one tick.
    ///
    /// `switch_requested` only has an effect in a green phase that has already been held for
    /// `min_green` ticks.
    pub fn tick(&mut self, switch_requested: bool) -> Option<PhaseTransition> {
        self.ticks += 1;
        self.elapsed = self.elapsed.saturating_add(1);

        let phase = self.program.phase(self.current);
        let (advance, forced) = match phase.kind() {
            PhaseKind::Green => {
                if self.elapsed < self.timing.min_green {
                    (false, false)
                } else if self.elapsed >= self.timing.max_green {
                    (true, !switch_requested)
                } else {
                    (switch_requested, false)
                }
            }
            PhaseKind::Yellow | PhaseKind::AllRed => (self.elapsed >= phase.duration(), false),
        };

        if !advance {
            return None;
        }

        let from = self.current;
        self.current = SignalProgram::next_index(from);
        self.elapsed = 0;
        self.transitions += 1;
        if forced {
            self.forced_switches += 1;
        }

        let next = self.program.phase(self.current);
        debug!(
            from,
            to = self.current,
            tick = self.ticks,
            forced,
            code = %next.signal_code(),
            "phase transition"
        );

        Some(PhaseTransition {
            from,
            to: self.current,
            signal_code: next.signal_code().clone(),
            tick: self.ticks,
            forced,
        })
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_phase(&self) -> &Phase {
        self.program.phase(self.current)
    }

    /// Ticks spent in the current phase
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Group whose green the cycle is in (phases 0..=2 NS, 3..=5 EW).
    pub fn active_group(&self) -> MovementGroup {
        self.current_phase().group()
    }

    /// Group currently holding a green indication, if any
    pub fn green_group(&self) -> Option<MovementGroup> {
        let phase = self.current_phase();
        (phase.kind() == PhaseKind::Green).then(|| phase.group())
    }

    pub fn in_clearance(&self) -> bool {
        self.current_phase().kind().is_clearance()
    }

    pub fn program(&self) -> &SignalProgram {
        &self.program
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn forced_switches(&self) -> u64 {
        self.forced_switches
    }
}
