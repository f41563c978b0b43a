use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};

use crate::rl::EpisodeResult;
use crate::signal::{RunSummary, SignalProgram};

#[derive(Parser)]
#[command(name = "greenwave")]
#[command(author = "Greenwave Team")]
#[command(version = "0.1.0")]
#[command(about = "Adaptive traffic signal control with a safety-constrained DQN agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(long, global = true, default_value = "config", env = "GREENWAVE_CONFIG_DIR")]
    pub config_dir: String,

    /// Seed for the simulated intersection (overrides simulation.seed)
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the queue-threshold adaptive controller
    Baseline {
        /// Simulated ticks to run
        #[arg(long, default_value = "3600")]
        max_steps: u64,
    },
    /// Run the fixed-time cycle
    Fixed {
        /// Simulated ticks to run
        #[arg(long, default_value = "3600")]
        max_steps: u64,
    },
    /// Train the DQN agent
    Train {
        /// Number of episodes (default: training.episodes)
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Ticks per episode (default: training.max_steps)
        #[arg(long)]
        max_steps: Option<u64>,
        /// Mini-batch size (default: training.batch_size)
        #[arg(long)]
        batch_size: Option<usize>,
        /// Checkpoint path (default: training.checkpoint_path)
        #[arg(short, long)]
        checkpoint: Option<String>,
        /// Ignore an existing checkpoint and start from fresh weights
        #[arg(long)]
        fresh: bool,
    },
    /// Greedy rollout of trained weights, without learning
    Eval {
        /// Simulated ticks to run (default: training.max_steps)
        #[arg(long)]
        max_steps: Option<u64>,
        /// Checkpoint path (default: training.checkpoint_path)
        #[arg(short, long)]
        checkpoint: Option<String>,
    },
    /// Print the six-phase signal program
    Program,
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Check the configuration and list every problem
    Validate,
}

#[derive(Tabled)]
struct PhaseRow {
    #[tabled(rename = "#")]
    index: usize,
    kind: String,
    group: String,
    #[tabled(rename = "ticks")]
    duration: u32,
    code: String,
}

#[derive(Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

#[derive(Tabled)]
struct EpisodeRow {
    episode: usize,
    reward: String,
    decisions: u64,
    updates: u64,
    loss: String,
    epsilon: String,
    saved: bool,
}

pub fn program_table(program: &SignalProgram) -> String {
    let rows: Vec<PhaseRow> = program
        .phases()
        .iter()
        .enumerate()
        .map(|(index, phase)| PhaseRow {
            index,
            kind: phase.kind().to_string(),
            group: phase.group().to_string(),
            duration: phase.duration(),
            code: phase.signal_code().to_string(),
        })
        .collect();
    Table::new(rows).to_string()
}

pub fn run_summary_table(summary: &RunSummary) -> String {
    let mut rows = vec![
        MetricRow {
            metric: "controller",
            value: summary.controller.clone(),
        },
        MetricRow {
            metric: "ticks",
            value: summary.ticks.to_string(),
        },
        MetricRow {
            metric: "phase changes",
            value: summary.transitions.to_string(),
        },
        MetricRow {
            metric: "forced switches",
            value: summary.forced_switches.to_string(),
        },
        MetricRow {
            metric: "delay (vehicle-ticks)",
            value: summary.total_delay_ticks.to_string(),
        },
        MetricRow {
            metric: "delay (hours)",
            value: format!("{:.2}", summary.delay_hours()),
        },
        MetricRow {
            metric: "mean queue",
            value: format!("{:.2}", summary.mean_queue()),
        },
        MetricRow {
            metric: "max queue",
            value: summary.max_queue.to_string(),
        },
    ];
    for (index, ticks) in summary.ticks_per_phase.iter().enumerate() {
        rows.push(MetricRow {
            metric: PHASE_LABELS[index],
            value: ticks.to_string(),
        });
    }
    Table::new(rows).to_string()
}

const PHASE_LABELS: [&str; 6] = [
    "ticks in phase 0",
    "ticks in phase 1",
    "ticks in phase 2",
    "ticks in phase 3",
    "ticks in phase 4",
    "ticks in phase 5",
];

pub fn episode_table(results: &[EpisodeResult]) -> String {
    let rows: Vec<EpisodeRow> = results
        .iter()
        .map(|r| EpisodeRow {
            episode: r.episode + 1,
            reward: format!("{:.2}", r.total_reward),
            decisions: r.decisions,
            updates: r.learn_updates,
            loss: r
                .mean_loss
                .map(|l| format!("{l:.4}"))
                .unwrap_or_else(|| "-".to_string()),
            epsilon: format!("{:.3}", r.epsilon),
            saved: r.checkpoint_saved,
        })
        .collect();
    Table::new(rows).to_string()
}

pub fn evaluation_table(result: &EpisodeResult) -> String {
    let rows = vec![
        MetricRow {
            metric: "ticks",
            value: result.ticks.to_string(),
        },
        MetricRow {
            metric: "decisions",
            value: result.decisions.to_string(),
        },
        MetricRow {
            metric: "phase changes",
            value: result.phase_transitions.to_string(),
        },
        MetricRow {
            metric: "total reward",
            value: format!("{:.2}", result.total_reward),
        },
        MetricRow {
            metric: "delay (vehicle-ticks)",
            value: result.total_delay_ticks.to_string(),
        },
        MetricRow {
            metric: "delay (hours)",
            value: format!("{:.2}", result.total_delay_ticks as f64 / 3600.0),
        },
    ];
    Table::new(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::build_program;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_train_overrides() {
        let cli = Cli::parse_from([
            "greenwave",
            "--seed",
            "7",
            "train",
            "--episodes",
            "3",
            "--checkpoint",
            "/tmp/q.json",
        ]);
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.config_dir, "config");
        match cli.command {
            Commands::Train {
                episodes,
                checkpoint,
                fresh,
                ..
            } => {
                assert_eq!(episodes, Some(3));
                assert_eq!(checkpoint.as_deref(), Some("/tmp/q.json"));
                assert!(!fresh);
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_program_table_lists_all_phases() {
        let program = build_program("GGrr", "rrGG", 22).unwrap();
        let table = program_table(&program);
        assert!(table.contains("GGrr"));
        assert!(table.contains("yyrr"));
        assert!(table.contains("rrrr"));
        assert!(table.contains("all-red"));
    }
}
