//! ## smartplc-cli
//! **Command-line front-end for the controller simulation**
//!
//! - `run`: real-time loop on the wall clock
//! - `simulate`: seeded, virtual-clock stepping with digest validation
//! - `signals`: catalogue listing

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    smartplc_telemetry::EventLogger::init(&config.telemetry.log_level)
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))?;

    match cli.command {
        Commands::Run(args) => commands::run(config, args).await,
        Commands::Simulate(args) => commands::simulate(config, args),
        Commands::Signals(args) => commands::signals(&config, args),
    }
}
