pub(crate) mod config;
pub(crate) mod control;
pub(crate) mod rl;

use greenwave::config::AppConfig;
use greenwave::environment::SimulationConfig;

/// Simulation settings with the command-line seed applied
pub(crate) fn simulation_config(config: &AppConfig, seed: Option<u64>) -> SimulationConfig {
    SimulationConfig {
        seed: seed.or(config.simulation.seed),
        ..config.simulation.clone()
    }
}
