use clap::Parser;
use greenwave::cli::Cli;
use greenwave::error::Result;

mod main_commands;
mod main_dispatch;
mod main_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    main_dispatch::run(&cli).await
}
