use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::environment::SimulationConfig;
use crate::error::{GreenwaveError, Result};
use crate::rl::{AgentConfig, TrainingConfig};
use crate::signal::{
    build_program, GreenTiming, SignalProgram, DEFAULT_GREEN_TICKS, DEFAULT_MAX_GREEN,
    DEFAULT_MIN_GREEN,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub intersection: IntersectionConfig,
    pub timing: TimingConfig,
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Lane layout of the controlled junction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntersectionConfig {
    /// Base signal code with the north-south movements green (e.g. "GGrr")
    #[serde(default)]
    pub ns_green: String,
    /// Base signal code with the east-west movements green (e.g. "rrGG")
    #[serde(default)]
    pub ew_green: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Program duration of each green phase, in ticks
    pub green_ticks: u32,
    /// Shortest green the state machine will cut
    pub min_green: u32,
    /// Longest green before a forced switch
    pub max_green: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            green_ticks: DEFAULT_GREEN_TICKS,
            min_green: DEFAULT_MIN_GREEN,
            max_green: DEFAULT_MAX_GREEN,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let agent = AgentConfig::default();
        let training = TrainingConfig::default();
        let simulation = SimulationConfig::default();
        let timing = TimingConfig::default();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("timing.green_ticks", timing.green_ticks)?
            .set_default("timing.min_green", timing.min_green)?
            .set_default("timing.max_green", timing.max_green)?
            .set_default("agent.buffer_capacity", agent.buffer_capacity as u64)?
            .set_default("agent.gamma", agent.gamma)?
            .set_default("agent.learning_rate", agent.learning_rate)?
            .set_default("agent.epsilon_start", agent.epsilon_start)?
            .set_default("agent.epsilon_min", agent.epsilon_min)?
            .set_default("agent.epsilon_decay", agent.epsilon_decay)?
            .set_default(
                "agent.hidden_sizes",
                agent
                    .hidden_sizes
                    .iter()
                    .map(|&h| h as u64)
                    .collect::<Vec<_>>(),
            )?
            .set_default("training.episodes", training.episodes as u64)?
            .set_default("training.max_steps", training.max_steps)?
            .set_default("training.batch_size", training.batch_size as u64)?
            .set_default("training.decision_interval", training.decision_interval)?
            .set_default("training.checkpoint_path", training.checkpoint_path)?
            .set_default("simulation.arrival_north", simulation.arrival_north)?
            .set_default("simulation.arrival_south", simulation.arrival_south)?
            .set_default("simulation.arrival_east", simulation.arrival_east)?
            .set_default("simulation.arrival_west", simulation.arrival_west)?
            .set_default("simulation.discharge_per_tick", simulation.discharge_per_tick)?
            .set_default("simulation.tick_secs", simulation.tick_secs)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/rush_hour.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GREENWAVE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GREENWAVE_TRAINING__EPISODES, etc.)
            .add_source(
                Environment::with_prefix("GREENWAVE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration for a plain two-approach-pair junction, without reading any files
    pub fn default_config() -> Self {
        Self {
            intersection: IntersectionConfig {
                ns_green: "GGrr".to_string(),
                ew_green: "rrGG".to_string(),
            },
            timing: TimingConfig::default(),
            agent: AgentConfig::default(),
            training: TrainingConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Six-phase program built from the intersection's base codes
    pub fn program(&self) -> Result<SignalProgram> {
        if self.intersection.ns_green.is_empty() || self.intersection.ew_green.is_empty() {
            return Err(GreenwaveError::Configuration(
                "intersection.ns_green and intersection.ew_green must both be set".to_string(),
            ));
        }
        build_program(
            &self.intersection.ns_green,
            &self.intersection.ew_green,
            self.timing.green_ticks,
        )
    }

    pub fn green_timing(&self) -> Result<GreenTiming> {
        GreenTiming::new(self.timing.min_green, self.timing.max_green)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.program() {
            errors.push(e.to_string());
        }
        match self.green_timing() {
            Ok(timing) => {
                let green = self.timing.green_ticks;
                if green < timing.min_green() || green > timing.max_green() {
                    errors.push(format!(
                        "timing.green_ticks ({green}) must lie within min_green ({}) and max_green ({})",
                        timing.min_green(),
                        timing.max_green()
                    ));
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        for (section, result) in [
            ("agent", self.agent.validate()),
            ("training", self.training.validate()),
            ("simulation", self.simulation.validate()),
        ] {
            if let Err(problems) = result {
                errors.extend(problems.into_iter().map(|p| format!("{section}: {p}")));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
