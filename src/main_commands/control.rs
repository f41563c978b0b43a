use greenwave::cli;
use greenwave::config::AppConfig;
use greenwave::environment::SimulatedIntersectionFactory;
use greenwave::error::Result;
use greenwave::signal::{AdaptiveBaseline, ControllerRun, FixedTime, SignalController};
use tracing::info;

/// Rule-based controller to drive
#[derive(Debug, Clone, Copy)]
pub(crate) enum ControllerKind {
    Adaptive,
    FixedTime,
}

pub(crate) async fn run_controller(
    config: &AppConfig,
    seed: Option<u64>,
    kind: ControllerKind,
    max_steps: u64,
) -> Result<()> {
    let simulation = super::simulation_config(config, seed);
    let run_seed = simulation.seed;
    let factory = SimulatedIntersectionFactory::new(simulation);
    let runner = ControllerRun::new(&factory, config.program()?, config.green_timing()?)
        .with_seed(run_seed);

    let controller: Box<dyn SignalController> = match kind {
        ControllerKind::Adaptive => Box::new(AdaptiveBaseline::new()),
        ControllerKind::FixedTime => Box::new(FixedTime::new()),
    };

    info!(controller = controller.name(), max_steps, "running rule-based controller");
    let summary = runner.run(controller.as_ref(), max_steps).await?;

    println!("{}", cli::run_summary_table(&summary));
    println!(
        "Total waiting time: {:.2} hours",
        summary.delay_hours()
    );
    Ok(())
}
