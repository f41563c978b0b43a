use greenwave::cli;
use greenwave::config::AppConfig;
use greenwave::error::{GreenwaveError, Result};

pub(crate) fn show_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| GreenwaveError::Other(anyhow::anyhow!("failed to render config: {e}")))?;
    println!("{rendered}");
    Ok(())
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<()> {
    match config.validate() {
        Ok(()) => {
            println!("\x1b[32m✓ configuration is valid\x1b[0m");
            Ok(())
        }
        Err(errors) => {
            for e in &errors {
                println!("\x1b[31m✗ {e}\x1b[0m");
            }
            Err(GreenwaveError::Configuration(format!(
                "{} configuration problem(s)",
                errors.len()
            )))
        }
    }
}

pub(crate) fn show_program(config: &AppConfig) -> Result<()> {
    let program = config.program()?;
    println!("{}", cli::program_table(&program));
    let timing = config.green_timing()?;
    println!(
        "Green bounds: min {} / max {} ticks",
        timing.min_green(),
        timing.max_green()
    );
    Ok(())
}
