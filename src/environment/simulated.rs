//! Simulated Intersection
//!
//! Four-approach queue model used for training and for comparing controllers without an
//! external simulator. Each approach is a FIFO queue fed by Bernoulli arrivals; lane `i` of the
//! active signal code controls approach `i` in N, S, E, W order.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

use super::{EnvironmentFactory, EnvironmentSession, QueueObservation, SessionConfig};
use crate::error::{GreenwaveError, Result};
use crate::signal::{SignalCode, SignalProgram, PHASE_COUNT};

const APPROACH_LABELS: [&str; 4] = ["N", "S", "E", "W"];

/// Demand and capacity of the simulated intersection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Per-tick arrival probability for each approach
    pub arrival_north: f64,
    pub arrival_south: f64,
    pub arrival_east: f64,
    pub arrival_west: f64,
    /// Vehicles an approach can discharge per green tick
    pub discharge_per_tick: u32,
    /// Seconds represented by one tick
    pub tick_secs: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        // Heavy main road, light side road
        Self {
            arrival_north: 0.4,
            arrival_south: 0.4,
            arrival_east: 0.08,
            arrival_west: 0.08,
            discharge_per_tick: 1,
            tick_secs: 1.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    fn arrival_rates(&self) -> [f64; 4] {
        [
            self.arrival_north,
            self.arrival_south,
            self.arrival_east,
            self.arrival_west,
        ]
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for (label, p) in APPROACH_LABELS.iter().zip(self.arrival_rates()) {
            if !(0.0..=1.0).contains(&p) {
                errors.push(format!("arrival probability for {label} must be in [0, 1], got {p}"));
            }
        }
        if self.discharge_per_tick == 0 {
            errors.push("discharge_per_tick must be positive".to_string());
        }
        if !(self.tick_secs.is_finite() && self.tick_secs > 0.0) {
            errors.push("tick_secs must be positive".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Opens [`SimulatedIntersection`] sessions
#[derive(Debug, Clone, Default)]
pub struct SimulatedIntersectionFactory {
    config: SimulationConfig,
}

impl SimulatedIntersectionFactory {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EnvironmentFactory for SimulatedIntersectionFactory {
    async fn start(&self, config: &SessionConfig) -> Result<Box<dyn EnvironmentSession>> {
        let seed = config.seed.or(self.config.seed);
        let session = SimulatedIntersection::new(
            self.config.clone(),
            config.program.clone(),
            seed,
            config.session_id,
        )?;
        Ok(Box::new(session))
    }
}

pub struct SimulatedIntersection {
    config: SimulationConfig,
    program: SignalProgram,
    code: SignalCode,
    rng: StdRng,
    queues: [VecDeque<String>; 4],
    waiting: HashMap<String, f64>,
    tick: u64,
    discharged: u64,
    session_id: Uuid,
    closed: bool,
}

impl SimulatedIntersection {
    pub fn new(
        config: SimulationConfig,
        program: SignalProgram,
        seed: Option<u64>,
        session_id: Uuid,
    ) -> Result<Self> {
        if program.lane_count() != APPROACH_LABELS.len() {
            return Err(GreenwaveError::Configuration(format!(
                "simulated intersection has {} approaches but the program controls {} lanes",
                APPROACH_LABELS.len(),
                program.lane_count()
            )));
        }
        config
            .validate()
            .map_err(|errors| GreenwaveError::Configuration(errors.join("; ")))?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let code = program.phase(0).signal_code().clone();

        info!(%session_id, ?seed, "simulated intersection session started");

        Ok(Self {
            config,
            program,
            code,
            rng,
            queues: Default::default(),
            waiting: HashMap::new(),
            tick: 0,
            discharged: 0,
            session_id,
            closed: false,
        })
    }

    /// Vehicles that have left the intersection so far
    pub fn discharged(&self) -> u64 {
        self.discharged
    }

    pub fn current_code(&self) -> &SignalCode {
        &self.code
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(GreenwaveError::EnvironmentUnavailable(format!(
                "session {} is closed",
                self.session_id
            )));
        }
        Ok(())
    }

    fn advance_one(&mut self) {
        let rates = self.config.arrival_rates();
        for (approach, rate) in rates.iter().enumerate() {
            if self.rng.gen_bool(*rate) {
                let id = format!("{}_{}", APPROACH_LABELS[approach], self.tick);
                self.waiting.insert(id.clone(), 0.0);
                self.queues[approach].push_back(id);
            }
        }

        for approach in 0..APPROACH_LABELS.len() {
            let green = self
                .code
                .lane(approach)
                .map(|s| s.is_green())
                .unwrap_or(false);
            if !green {
                continue;
            }
            for _ in 0..self.config.discharge_per_tick {
                match self.queues[approach].pop_front() {
                    Some(id) => {
                        self.waiting.remove(&id);
                        self.discharged += 1;
                    }
                    None => break,
                }
            }
        }

        // Everything still queued was halted for this tick
        let tick_secs = self.config.tick_secs;
        for queue in &self.queues {
            for id in queue {
                if let Some(w) = self.waiting.get_mut(id) {
                    *w += tick_secs;
                }
            }
        }

        self.tick += 1;
    }
}

#[async_trait]
impl EnvironmentSession for SimulatedIntersection {
    async fn step(&mut self, n_ticks: u32) -> Result<()> {
        self.ensure_open()?;
        for _ in 0..n_ticks {
            self.advance_one();
        }
        Ok(())
    }

    fn observe(&self) -> Result<QueueObservation> {
        self.ensure_open()?;
        Ok(QueueObservation::new(
            self.queues[0].len() as u32,
            self.queues[1].len() as u32,
            self.queues[2].len() as u32,
            self.queues[3].len() as u32,
        ))
    }

    fn list_active_entities(&self) -> Result<HashSet<String>> {
        self.ensure_open()?;
        Ok(self.waiting.keys().cloned().collect())
    }

    fn get_waiting_time(&self, id: &str) -> Result<f64> {
        self.ensure_open()?;
        self.waiting
            .get(id)
            .copied()
            .ok_or_else(|| GreenwaveError::Validation(format!("unknown vehicle id: {id}")))
    }

    fn apply_phase(&mut self, phase_index: usize) -> Result<()> {
        self.ensure_open()?;
        if phase_index >= PHASE_COUNT {
            return Err(GreenwaveError::Validation(format!(
                "phase index {phase_index} out of range (0..{PHASE_COUNT})"
            )));
        }
        self.code = self.program.phase(phase_index).signal_code().clone();
        debug!(tick = self.tick, phase = phase_index, code = %self.code, "phase applied");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            info!(
                session_id = %self.session_id,
                ticks = self.tick,
                discharged = self.discharged,
                "simulated intersection session closed"
            );
        }
        Ok(())
    }
}
