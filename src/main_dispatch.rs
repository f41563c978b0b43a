use greenwave::cli::{Cli, Commands, ConfigCommands};
use greenwave::config::AppConfig;
use greenwave::error::Result;

use crate::main_commands::control::ControllerKind;
use crate::main_commands::rl::TrainOptions;

pub(crate) async fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::load_from(&cli.config_dir)?;

    match &cli.command {
        Commands::Baseline { max_steps } => {
            crate::main_runtime::init_logging(&config.logging);
            crate::main_commands::control::run_controller(
                &config,
                cli.seed,
                ControllerKind::Adaptive,
                *max_steps,
            )
            .await?;
        }
        Commands::Fixed { max_steps } => {
            crate::main_runtime::init_logging(&config.logging);
            crate::main_commands::control::run_controller(
                &config,
                cli.seed,
                ControllerKind::FixedTime,
                *max_steps,
            )
            .await?;
        }
        Commands::Train {
            episodes,
            max_steps,
            batch_size,
            checkpoint,
            fresh,
        } => {
            crate::main_runtime::init_logging(&config.logging);
            let options = TrainOptions {
                episodes: *episodes,
                max_steps: *max_steps,
                batch_size: *batch_size,
                checkpoint: checkpoint.clone(),
                fresh: *fresh,
            };
            crate::main_commands::rl::run_train(&config, cli.seed, options).await?;
        }
        Commands::Eval {
            max_steps,
            checkpoint,
        } => {
            crate::main_runtime::init_logging(&config.logging);
            crate::main_commands::rl::run_eval(&config, cli.seed, *max_steps, checkpoint.clone())
                .await?;
        }
        Commands::Program => {
            crate::main_runtime::init_logging_simple();
            crate::main_commands::config::show_program(&config)?;
        }
        Commands::Config(ConfigCommands::Show) => {
            crate::main_runtime::init_logging_simple();
            crate::main_commands::config::show_config(&config)?;
        }
        Commands::Config(ConfigCommands::Validate) => {
            crate::main_runtime::init_logging_simple();
            crate::main_commands::config::validate_config(&config)?;
        }
    }

    Ok(())
}
