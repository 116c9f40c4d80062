mod args;
mod output;
mod runner;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Commands};
use runner::{run_probe, run_ranges};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    edgescout_telemetry::init_logging(cli.verbose, cli.log_json)?;

    match cli.command {
        Commands::Probe(args) => run_probe(args).await?,
        Commands::Ranges(args) => run_ranges(args)?,
    }

    Ok(())
}
