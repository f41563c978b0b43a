//! Phase Program
//!
//! Builds the six-phase signal cycle from the two base green indications:
//!
//! ```text
//! 0 NS green ─▶ 1 NS yellow ─▶ 2 all-red ─▶ 3 EW green ─▶ 4 EW yellow ─▶ 5 all-red ─┐
//! ▲                                                                                   │
//! └───────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-lane codes use the SUMO alphabet: `G` (priority green), `g` (permissive green),
//! `y` (yellow) and `r` (red).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GreenwaveError, Result};

/// Number of phases in every program
pub const PHASE_COUNT: usize = 6;

/// Clearance durations. These are not configurable.
pub const YELLOW_TICKS: u32 = 3;
pub const ALL_RED_TICKS: u32 = 1;

/// Default program duration of a green phase
pub const DEFAULT_GREEN_TICKS: u32 = 22;

/// Indication shown to a single lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneSignal {
    /// Priority green (`G`)
    Green,
    /// Permissive green (`g`)
    GreenMinor,
    /// Yellow (`y`)
    Yellow,
    /// Red (`r`)
    Red,
}

impl LaneSignal {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'G' => Some(Self::Green),
            'g' => Some(Self::GreenMinor),
            'y' => Some(Self::Yellow),
            'r' => Some(Self::Red),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Green => 'G',
            Self::GreenMinor => 'g',
            Self::Yellow => 'y',
            Self::Red => 'r',
        }
    }

    pub fn is_green(&self) -> bool {
        matches!(self, Self::Green | Self::GreenMinor)
    }

    /// Anything other than red grants (or is clearing) right-of-way.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Red)
    }
}

/// Fixed-length sequence of per-lane indications
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalCode(Vec<LaneSignal>);

impl SignalCode {
    pub fn lanes(&self) -> &[LaneSignal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn lane(&self, index: usize) -> Option<LaneSignal> {
        self.0.get(index).copied()
    }

    pub fn has_active_lane(&self) -> bool {
        self.0.iter().any(LaneSignal::is_active)
    }

    /// Green lanes turn yellow, everything else is unchanged.
    pub fn to_yellow(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|s| if s.is_green() { LaneSignal::Yellow } else { *s })
                .collect(),
        )
    }

    pub fn to_all_red(&self) -> Self {
        Self(vec![LaneSignal::Red; self.0.len()])
    }
}

impl FromStr for SignalCode {
    type Err = GreenwaveError;

    fn from_str(raw: &str) -> Result<Self> {
        let lanes = raw
            .trim()
            .chars()
            .enumerate()
            .map(|(i, c)| {
                LaneSignal::from_char(c).ok_or_else(|| {
                    GreenwaveError::Configuration(format!(
                        "invalid lane indication '{c}' at position {i} in \"{raw}\" (expected one of G g y r)"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(lanes))
    }
}

impl fmt::Display for SignalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for lane in &self.0 {
            write!(f, "{}", lane.as_char())?;
        }
        Ok(())
    }
}

/// Conflicting movement group that can hold right-of-way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementGroup {
    NorthSouth,
    EastWest,
}

impl MovementGroup {
    /// Agent action index (0 = NS green, 1 = EW green)
    pub fn action(&self) -> usize {
        match self {
            Self::NorthSouth => 0,
            Self::EastWest => 1,
        }
    }

    pub fn from_action(action: usize) -> Option<Self> {
        match action {
            0 => Some(Self::NorthSouth),
            1 => Some(Self::EastWest),
            _ => None,
        }
    }

    pub fn opposing(&self) -> Self {
        match self {
            Self::NorthSouth => Self::EastWest,
            Self::EastWest => Self::NorthSouth,
        }
    }

    /// Index of this group's green phase within the program
    pub fn green_phase(&self) -> usize {
        match self {
            Self::NorthSouth => 0,
            Self::EastWest => 3,
        }
    }
}

impl fmt::Display for MovementGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NorthSouth => write!(f, "NS"),
            Self::EastWest => write!(f, "EW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseKind {
    Green,
    Yellow,
    AllRed,
}

impl PhaseKind {
    /// Yellow and all-red phases cannot be altered by any policy.
    pub fn is_clearance(&self) -> bool {
        !matches!(self, Self::Green)
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Green => write!(f, "green"),
            Self::Yellow => write!(f, "yellow"),
            Self::AllRed => write!(f, "all-red"),
        }
    }
}

/// One signal configuration with a fixed duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    duration: u32,
    signal_code: SignalCode,
    kind: PhaseKind,
    group: MovementGroup,
}

impl Phase {
    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn signal_code(&self) -> &SignalCode {
        &self.signal_code
    }

    pub fn kind(&self) -> PhaseKind {
        self.kind
    }

    /// Group whose green this phase belongs to (or is clearing)
    pub fn group(&self) -> MovementGroup {
        self.group
    }
}

/// Ordered six-phase cycle for one intersection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalProgram {
    phases: [Phase; PHASE_COUNT],
}

impl SignalProgram {
    pub fn phase(&self, index: usize) -> &Phase {
        &self.phases[index % PHASE_COUNT]
    }

    pub fn phases(&self) -> &[Phase; PHASE_COUNT] {
        &self.phases
    }

    pub fn next_index(index: usize) -> usize {
        (index + 1) % PHASE_COUNT
    }

    /// Number of lanes controlled by every phase
    pub fn lane_count(&self) -> usize {
        self.phases[0].signal_code.len()
    }
}

/// Builds the canonical cycle from NS and EW base green codes.
pub fn build_program(ns_green: &str, ew_green: &str, green_ticks: u32) -> Result<SignalProgram> {
    let ns: SignalCode = ns_green.parse()?;
    let ew: SignalCode = ew_green.parse()?;
    build_program_from_codes(ns, ew, green_ticks)
}

pub fn build_program_from_codes(
    ns_green: SignalCode,
    ew_green: SignalCode,
    green_ticks: u32,
) -> Result<SignalProgram> {
    if ns_green.len() != ew_green.len() {
        return Err(GreenwaveError::Configuration(format!(
            "base green codes differ in length: \"{ns_green}\" has {} lanes, \"{ew_green}\" has {}",
            ns_green.len(),
            ew_green.len()
        )));
    }
    if ns_green.is_empty() {
        return Err(GreenwaveError::Configuration(
            "base green codes must control at least one lane".to_string(),
        ));
    }
    if !ns_green.has_active_lane() && !ew_green.has_active_lane() {
        return Err(GreenwaveError::Configuration(format!(
            "neither \"{ns_green}\" nor \"{ew_green}\" grants right-of-way to any lane"
        )));
    }
    if green_ticks == 0 {
        return Err(GreenwaveError::Configuration(
            "green phase duration must be positive".to_string(),
        ));
    }

    let phase = |duration, signal_code, kind, group| Phase {
        duration,
        signal_code,
        kind,
        group,
    };
    use MovementGroup::{EastWest, NorthSouth};

    let phases = [
        phase(green_ticks, ns_green.clone(), PhaseKind::Green, NorthSouth),
        phase(YELLOW_TICKS, ns_green.to_yellow(), PhaseKind::Yellow, NorthSouth),
        phase(ALL_RED_TICKS, ns_green.to_all_red(), PhaseKind::AllRed, NorthSouth),
        phase(green_ticks, ew_green.clone(), PhaseKind::Green, EastWest),
        phase(YELLOW_TICKS, ew_green.to_yellow(), PhaseKind::Yellow, EastWest),
        phase(ALL_RED_TICKS, ew_green.to_all_red(), PhaseKind::AllRed, EastWest),
    ];

    Ok(SignalProgram { phases })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(program: &SignalProgram) -> Vec<(String, u32)> {
        program
            .phases()
            .iter()
            .map(|p| (p.signal_code().to_string(), p.duration()))
            .collect()
    }

    #[test]
    fn builds_canonical_cycle() {
        let program = build_program("GGrr", "rrGG", DEFAULT_GREEN_TICKS).unwrap();
        let expected = vec![
            ("GGrr".to_string(), 22),
            ("yyrr".to_string(), 3),
            ("rrrr".to_string(), 1),
            ("rrGG".to_string(), 22),
            ("rryy".to_string(), 3),
            ("rrrr".to_string(), 1),
        ];
        assert_eq!(codes(&program), expected);
    }

    #[test]
    fn permissive_green_also_clears_through_yellow() {
        let program = build_program("GgrrGgrr", "rrGgrrGg", 22).unwrap();
        assert_eq!(program.phase(1).signal_code().to_string(), "yyrryyrr");
        assert_eq!(program.phase(4).signal_code().to_string(), "rryyrryy");
    }

    #[test]
    fn red_lanes_stay_red_through_clearance() {
        let program = build_program("GrGr", "rGrG", 22).unwrap();
        let green = program.phase(0).signal_code();
        for clearance in [program.phase(1), program.phase(2)] {
            for (i, lane) in green.lanes().iter().enumerate() {
                if *lane == LaneSignal::Red {
                    assert_eq!(clearance.signal_code().lane(i), Some(LaneSignal::Red));
                }
            }
        }
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = build_program("GGrr", "rrG", 22).unwrap_err();
        assert!(matches!(err, GreenwaveError::Configuration(_)));
    }

    #[test]
    fn rejects_all_red_bases() {
        let err = build_program("rrrr", "rrrr", 22).unwrap_err();
        assert!(matches!(err, GreenwaveError::Configuration(_)));
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(build_program("GGxx", "rrGG", 22).is_err());
        assert!(build_program("", "", 22).is_err());
    }

    #[test]
    fn index_advances_modulo_six() {
        assert_eq!(SignalProgram::next_index(0), 1);
        assert_eq!(SignalProgram::next_index(5), 0);
    }

    #[test]
    fn groups_map_to_green_phases() {
        assert_eq!(MovementGroup::NorthSouth.green_phase(), 0);
        assert_eq!(MovementGroup::EastWest.green_phase(), 3);
        assert_eq!(MovementGroup::from_action(1), Some(MovementGroup::EastWest));
        assert_eq!(MovementGroup::from_action(2), None);
    }
}
