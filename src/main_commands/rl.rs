use greenwave::cli;
use greenwave::config::AppConfig;
use greenwave::environment::SimulatedIntersectionFactory;
use greenwave::error::Result;
use greenwave::rl::{DqnAgent, TrainingOrchestrator, TrainingStats};
use std::path::Path;
use tracing::{info, warn};

/// Overrides for the `[training]` section
#[derive(Debug, Default)]
pub(crate) struct TrainOptions {
    pub episodes: Option<usize>,
    pub max_steps: Option<u64>,
    pub batch_size: Option<usize>,
    pub checkpoint: Option<String>,
    pub fresh: bool,
}

pub(crate) async fn run_train(
    config: &AppConfig,
    seed: Option<u64>,
    options: TrainOptions,
) -> Result<()> {
    let mut training = config.training.clone();
    if let Some(episodes) = options.episodes {
        training.episodes = episodes;
    }
    if let Some(max_steps) = options.max_steps {
        training.max_steps = max_steps;
    }
    if let Some(batch_size) = options.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(checkpoint) = options.checkpoint {
        training.checkpoint_path = checkpoint;
    }

    let simulation = super::simulation_config(config, seed);
    let run_seed = simulation.seed;
    let factory = SimulatedIntersectionFactory::new(simulation);

    let mut agent = DqnAgent::new(config.agent.clone())?;
    let checkpoint = training.checkpoint_path.clone();
    if !options.fresh && Path::new(&checkpoint).exists() {
        match agent.load(&checkpoint) {
            Ok(()) => info!("Resuming from checkpoint {}", checkpoint),
            Err(e) => warn!(
                "Could not load checkpoint {} ({}), starting from fresh weights",
                checkpoint, e
            ),
        }
    }

    println!("Episodes:    {}", training.episodes);
    println!("Max steps:   {}", training.max_steps);
    println!("Batch size:  {}", training.batch_size);
    println!("Checkpoint:  {}", checkpoint);

    let orchestrator = TrainingOrchestrator::new(
        &factory,
        config.program()?,
        config.green_timing()?,
        training,
    )?
    .with_seed(run_seed);

    let results = orchestrator.run(&mut agent).await?;
    let stats = TrainingStats::from_results(&results);

    println!("{}", cli::episode_table(&results));
    println!(
        "Trained {} episodes, {} updates, best score {:.2}",
        stats.episodes,
        stats.updates,
        stats.best_reward.unwrap_or_default()
    );
    if stats.checkpoint_failures > 0 {
        println!(
            "\x1b[33m! {} checkpoint save(s) failed, see log\x1b[0m",
            stats.checkpoint_failures
        );
    }
    Ok(())
}

pub(crate) async fn run_eval(
    config: &AppConfig,
    seed: Option<u64>,
    max_steps: Option<u64>,
    checkpoint: Option<String>,
) -> Result<()> {
    let mut training = config.training.clone();
    if let Some(max_steps) = max_steps {
        training.max_steps = max_steps;
    }
    let checkpoint = checkpoint.unwrap_or_else(|| training.checkpoint_path.clone());

    let mut agent = DqnAgent::new(config.agent.clone())?;
    agent.load(&checkpoint)?;

    let simulation = super::simulation_config(config, seed);
    let run_seed = simulation.seed;
    let factory = SimulatedIntersectionFactory::new(simulation);
    let orchestrator = TrainingOrchestrator::new(
        &factory,
        config.program()?,
        config.green_timing()?,
        training,
    )?
    .with_seed(run_seed);

    let result = orchestrator.evaluate(&mut agent).await?;
    println!("{}", cli::evaluation_table(&result));
    Ok(())
}
