mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;

#[derive(Parser, Debug)]
#[command(name = "lattice", version, about = "Build-matrix CI orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the build matrix
    Run(commands::run::RunArgs),
    /// Validate a matrix description
    Validate(commands::validate::ValidateArgs),
    /// List the expanded jobs without running them
    Jobs(commands::jobs::JobsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args),
        Command::Jobs(args) => commands::jobs::execute(args),
    }
}
